//! Line-oriented config document model.
//!
//! Files such as `sshd_config` are a flat list of `Keyword arguments` lines,
//! interleaved with comments and blank lines.  Distribution defaults ship
//! most settings commented out (`#PermitRootLogin prohibit-password`), so
//! enforcing a setting means finding either the active line or the
//! commented-out template for it and rewriting it.
//!
//! [`ConfigDocument`] parses text into [`ConfigLine`] records and renders them
//! back.  An unmodified document renders to exactly the bytes it was parsed
//! from; that is what lets callers skip rewriting a file when nothing changed.
//!
//! # Which lines count as a setting?
//!
//! | Line                                   | key                 | is_comment |
//! |----------------------------------------|---------------------|------------|
//! | `PermitRootLogin no`                   | `PermitRootLogin`   | false      |
//! | `   Port=2222`                         | `Port`              | false      |
//! | `#PermitRootLogin prohibit-password`   | `PermitRootLogin`   | true       |
//! | `##Port 22`                            | `Port`              | true       |
//! | `# Authentication:`                    | none (prose)        | true       |
//! | *(blank)*                              | none                | false      |
//!
//! A comment is only treated as a commented-out setting when the keyword
//! follows the `#` run directly.  `# Port forwarding is disabled` is prose.

use crate::domain::directive::Directive;

/// One physical line of a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLine {
    /// The line exactly as it appears in the file, without the newline.
    pub raw: String,
    /// The setting keyword, if this line is an active or commented-out setting.
    pub key: Option<String>,
    /// The setting arguments, trimmed.  `None` when `key` is `None`.
    pub value: Option<String>,
    /// `true` if the line starts (after indentation) with `#`.
    pub is_comment: bool,
}

impl ConfigLine {
    /// Parses a single line (without its trailing newline).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        let is_comment = trimmed.starts_with('#');
        let body = if is_comment {
            trimmed.trim_start_matches('#')
        } else {
            trimmed
        };

        // Commented prose ("# Foo bar") is not a setting.
        let setting = if is_comment && body.starts_with(char::is_whitespace) {
            None
        } else {
            split_setting(body)
        };

        let (key, value) = match setting {
            Some((k, v)) => (Some(k.to_string()), Some(v.to_string())),
            None => (None, None),
        };

        Self {
            raw: raw.to_string(),
            key,
            value,
            is_comment,
        }
    }

    /// The line without a CRLF file's trailing `\r`.
    pub fn content(&self) -> &str {
        self.raw.strip_suffix('\r').unwrap_or(&self.raw)
    }

    fn has_cr(&self) -> bool {
        self.raw.ends_with('\r')
    }

    /// Returns `true` if this line is an active or commented-out occurrence
    /// of the directive's key.
    pub fn is_setting_for(&self, directive: &Directive) -> bool {
        self.key.as_deref().is_some_and(|k| directive.matches_key(k))
    }

    /// Returns `true` if this is an active (uncommented) setting line.
    pub fn is_active_setting(&self) -> bool {
        self.key.is_some() && !self.is_comment
    }
}

/// Splits `Keyword args` / `Keyword=args` into its parts.
fn split_setting(body: &str) -> Option<(&str, &str)> {
    let body = body.trim_end();
    if body.is_empty() {
        return None;
    }
    let key_end = body
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(body.len());
    let (key, rest) = body.split_at(key_end);
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest).trim_start();
    Some((key, rest))
}

/// The outcome of applying one directive to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The document already contained exactly the enforced line.
    Unchanged,
    /// An existing (possibly commented-out) setting was rewritten.
    Replaced,
    /// No line mentioned the key; the enforced line was appended.
    Appended,
}

impl ApplyOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, ApplyOutcome::Unchanged)
    }
}

/// A parsed config file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigDocument {
    lines: Vec<ConfigLine>,
    trailing_newline: bool,
}

impl ConfigDocument {
    /// Parses file content into line records.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        let trailing_newline = text.ends_with('\n');
        let body = if trailing_newline {
            &text[..text.len() - 1]
        } else {
            text
        };
        Self {
            lines: body.split('\n').map(ConfigLine::parse).collect(),
            trailing_newline,
        }
    }

    pub fn lines(&self) -> &[ConfigLine] {
        &self.lines
    }

    /// Renders the document back to file content.
    pub fn render(&self) -> String {
        let mut out = self
            .lines
            .iter()
            .map(|l| l.raw.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Returns the value of the first active setting for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .filter(|l| l.is_active_setting())
            .find(|l| l.key.as_deref().is_some_and(|k| k.eq_ignore_ascii_case(key)))
            .and_then(|l| l.value.as_deref())
    }

    /// Reports what [`apply`](Self::apply) would do without modifying the document.
    pub fn outcome_of(&self, directive: &Directive) -> ApplyOutcome {
        let target = directive.line();
        let mut matching = self.lines.iter().filter(|l| l.is_setting_for(directive));
        match (matching.next(), matching.next()) {
            (None, _) => ApplyOutcome::Appended,
            (Some(only), None) if only.content() == target => ApplyOutcome::Unchanged,
            _ => ApplyOutcome::Replaced,
        }
    }

    /// Enforces `directive` on the document.
    ///
    /// The first line mentioning the key (active or commented out) is
    /// rewritten to `key value`; any later lines mentioning the key are
    /// removed so exactly one active setting remains.  When no line mentions
    /// the key, `key value` is appended at the end.
    ///
    /// Applying the same directive a second time returns
    /// [`ApplyOutcome::Unchanged`] and leaves the document untouched.
    ///
    /// A rewritten line keeps the terminator of the line it replaces; an
    /// appended line follows the first line's, so CRLF files stay CRLF.
    pub fn apply(&mut self, directive: &Directive) -> ApplyOutcome {
        let outcome = self.outcome_of(directive);
        let terminated = |cr: bool| {
            let mut line = directive.line();
            if cr {
                line.push('\r');
            }
            ConfigLine::parse(&line)
        };

        match outcome {
            ApplyOutcome::Unchanged => {}
            ApplyOutcome::Appended => {
                let crlf = self.lines.first().is_some_and(ConfigLine::has_cr);
                if let Some(last) = self.lines.last_mut().filter(|l| crlf && !l.has_cr()) {
                    *last = ConfigLine::parse(&format!("{}\r", last.raw));
                }
                self.lines.push(terminated(crlf));
                self.trailing_newline = true;
            }
            ApplyOutcome::Replaced => {
                let mut seen = false;
                self.lines.retain(|l| {
                    if !l.is_setting_for(directive) {
                        return true;
                    }
                    // Keep only the first occurrence; it is rewritten below.
                    !std::mem::replace(&mut seen, true)
                });
                if let Some(first) = self.lines.iter_mut().find(|l| l.is_setting_for(directive)) {
                    *first = terminated(first.has_cr());
                }
                self.trailing_newline = true;
            }
        }
        outcome
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
