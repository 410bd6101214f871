//! hostkit command-line entry point.
//!
//! Parses arguments, loads the settings file, wires the OS adapters into the
//! use cases, and prints a one-screen summary of what changed.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ Cli::parse()            -- clap, with HOSTKIT_* env fallbacks
//!  └─ load_config()           -- /etc/hostkit/config.toml, defaults if absent
//!  └─ init_logging()          -- RUST_LOG > -v > [general] log_level
//!  └─ Adapters::system()      -- real OS ports
//!  └─ dispatch
//!       ├─ sshd               -> ProvisionSshdUseCase
//!       ├─ runtime install    -> ManageRuntimeUseCase::install
//!       ├─ runtime remove     -> ManageRuntimeUseCase::remove
//!       ├─ patch              -> ConfigPatcher::run / preview
//!       ├─ restore            -> ConfigPatcher::restore
//!       ├─ backups            -> ConfigPatcher::backups
//!       └─ config show        -> render_config
//! ```
//!
//! Any error is printed with its cause chain and the process exits with
//! status 1.  Declining a prompt is not an error.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hostkit::application::manage_runtime::{
    InstallOutcome, ManageRuntimeUseCase, Platform, RemoveOutcome, RuntimePorts,
};
use hostkit::application::patch_config::{ConfigPatcher, ConfigValidator, PatchConfig};
use hostkit::application::ports::{CommandRunner, Prompter};
use hostkit::application::provision_sshd::{ProvisionSshdUseCase, SshdOutcome, SshdPorts};
use hostkit::infrastructure::network::HttpFetcher;
use hostkit::infrastructure::prompt::{AssumeYes, InquirePrompter};
use hostkit::infrastructure::storage::config::{
    load_config, render_config, HostkitConfig, DEFAULT_CONFIG_PATH,
};
use hostkit::infrastructure::storage::fs::FsConfigStorage;
use hostkit::infrastructure::system::clock::SystemClock;
use hostkit::infrastructure::system::command::SystemCommandRunner;
use hostkit::infrastructure::system::fs::OsFilesystem;
use hostkit::infrastructure::system::locator::PathLocator;
use hostkit::infrastructure::system::packages::SystemPackageManager;
use hostkit::infrastructure::system::privilege::RootPrivilege;
use hostkit::infrastructure::system::services::SystemServiceManager;
use hostkit::infrastructure::validator::{CommandValidator, NoValidation};
use hostkit_core::Directive;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Idempotent host provisioning with config backup and rollback.
#[derive(Debug, Parser)]
#[command(name = "hostkit", version)]
struct Cli {
    /// Settings file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH, env = "HOSTKIT_CONFIG")]
    config: PathBuf,

    /// Answer "yes" to every confirmation prompt.
    #[arg(long, short = 'y', global = true, env = "HOSTKIT_YES")]
    yes: bool,

    /// More log output (-v debug, -vv trace).  `RUST_LOG` takes precedence.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install and configure the SSH daemon.
    Sshd,
    /// Install or remove the language runtime.
    #[command(subcommand)]
    Runtime(RuntimeCommand),
    /// Enforce directives on any line-oriented config file.
    Patch(PatchArgs),
    /// Copy the permanent original backup back over a file.
    Restore(FileArgs),
    /// List a file's backups.
    Backups(FileArgs),
    /// Inspect the effective settings.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
enum RuntimeCommand {
    /// Download and install the newest stable (or pinned) release.
    Install,
    /// Remove the installed runtime and its PATH snippet.
    Remove,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the settings in effect, defaults included, as TOML.
    Show,
}

#[derive(Debug, Args)]
struct FileArgs {
    /// The config file.
    #[arg(long)]
    file: PathBuf,
}

#[derive(Debug, Args)]
struct PatchArgs {
    /// The config file to patch.
    #[arg(long)]
    file: PathBuf,

    /// Directive to enforce, `Key=value` or "Key value".  Repeatable.
    #[arg(long = "set", required = true, value_name = "KEY=VALUE")]
    directives: Vec<Directive>,

    /// Validator command; `{path}` is replaced by the file, otherwise the
    /// path is appended.  No validation when omitted.
    #[arg(long, value_name = "CMD")]
    validate: Option<String>,

    /// Report what would change without touching the file.
    #[arg(long)]
    dry_run: bool,
}

// ── Wiring ────────────────────────────────────────────────────────────────────

/// The production OS adapters.
struct Adapters {
    runner: Arc<dyn CommandRunner>,
    locator: Arc<PathLocator>,
    prompter: Arc<dyn Prompter>,
}

impl Adapters {
    fn system(assume_yes: bool) -> Self {
        let prompter: Arc<dyn Prompter> = if assume_yes {
            Arc::new(AssumeYes)
        } else {
            Arc::new(InquirePrompter)
        };
        Self {
            runner: Arc::new(SystemCommandRunner),
            locator: Arc::new(PathLocator::new()),
            prompter,
        }
    }

    fn patcher(&self, config: PatchConfig, validator: Arc<dyn ConfigValidator>) -> ConfigPatcher {
        ConfigPatcher::new(
            config,
            Arc::new(FsConfigStorage::new()),
            validator,
            Arc::new(SystemClock),
        )
    }

    fn packages(&self) -> Arc<SystemPackageManager> {
        Arc::new(SystemPackageManager::detect(
            self.locator.as_ref(),
            self.runner.clone(),
        ))
    }
}

fn init_logging(verbose: u8, configured: &str) {
    let fallback = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_config(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    init_logging(cli.verbose, &settings.general.log_level);

    let adapters = Adapters::system(cli.yes);
    match cli.command {
        Command::Sshd => provision_sshd(&adapters, &settings),
        Command::Runtime(RuntimeCommand::Install) => install_runtime(&adapters, &settings),
        Command::Runtime(RuntimeCommand::Remove) => remove_runtime(&adapters, &settings),
        Command::Patch(args) => patch(&adapters, &settings, args),
        Command::Restore(args) => restore(&adapters, &settings, args),
        Command::Backups(args) => backups(&adapters, &settings, args),
        Command::Config(ConfigCommand::Show) => {
            print!("{}", render_config(&settings)?);
            Ok(())
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn provision_sshd(adapters: &Adapters, settings: &HostkitConfig) -> anyhow::Result<()> {
    let sshd = &settings.sshd;
    let validator = CommandValidator::from_command(&sshd.validate_command, adapters.runner.clone())
        .context("[sshd] validate_command must not be empty")?;
    let patcher = adapters.patcher(
        settings
            .backup
            .patch_config(&sshd.config_path, sshd.directives.clone()),
        Arc::new(validator),
    );
    let use_case = ProvisionSshdUseCase::new(
        SshdPorts {
            privilege: Arc::new(RootPrivilege),
            prompter: adapters.prompter.clone(),
            packages: adapters.packages(),
            services: Arc::new(SystemServiceManager::detect(
                adapters.locator.as_ref(),
                adapters.runner.clone(),
            )),
            locator: adapters.locator.clone(),
            files: Arc::new(OsFilesystem),
        },
        patcher,
        sshd.service_units.clone(),
    );

    match use_case.execute().context("SSH daemon provisioning failed")? {
        SshdOutcome::Declined => println!("Nothing changed."),
        SshdOutcome::Configured {
            report,
            service,
            restarted,
            overrides,
        } => {
            for outcome in &report.outcomes {
                println!("  {:<40} {:?}", outcome.directive.line(), outcome.outcome);
            }
            println!("Backup: {}", report.backup.backup.path.display());
            println!(
                "{service} is active{}.",
                if restarted { " (restarted)" } else { "" }
            );
            for o in &overrides {
                println!(
                    "warning: {} sets `{} {}` and overrides {}",
                    o.file.display(),
                    o.key,
                    o.value,
                    report.file_path.display()
                );
            }
        }
    }
    Ok(())
}

fn runtime_use_case(adapters: &Adapters, settings: &HostkitConfig) -> anyhow::Result<ManageRuntimeUseCase> {
    Ok(ManageRuntimeUseCase::new(
        RuntimePorts {
            privilege: Arc::new(RootPrivilege),
            prompter: adapters.prompter.clone(),
            packages: adapters.packages(),
            locator: adapters.locator.clone(),
            fetcher: Arc::new(HttpFetcher::new()?),
            runner: adapters.runner.clone(),
            files: Arc::new(OsFilesystem),
        },
        settings.runtime.settings(),
        Platform::current()?,
    ))
}

fn install_runtime(adapters: &Adapters, settings: &HostkitConfig) -> anyhow::Result<()> {
    let use_case = runtime_use_case(adapters, settings)?;
    let name = use_case.settings().name.clone();
    match use_case
        .install()
        .with_context(|| format!("installing {name} failed"))?
    {
        InstallOutcome::Declined => println!("Nothing changed."),
        InstallOutcome::Installed {
            version,
            install_dir,
            reported,
        } => {
            println!("Installed {name} {version} to {}.", install_dir.display());
            println!("  {reported}");
            println!(
                "Open a new login shell (or source {}) to use it.",
                use_case.settings().profile_path().display()
            );
        }
    }
    Ok(())
}

fn remove_runtime(adapters: &Adapters, settings: &HostkitConfig) -> anyhow::Result<()> {
    let use_case = runtime_use_case(adapters, settings)?;
    let name = use_case.settings().name.clone();
    match use_case
        .remove()
        .with_context(|| format!("removing {name} failed"))?
    {
        RemoveOutcome::NotInstalled => println!("{name} is not installed."),
        RemoveOutcome::Declined => println!("Nothing changed."),
        RemoveOutcome::Removed { install_dir } => {
            println!("Removed {name} from {}.", install_dir.display());
        }
    }
    Ok(())
}

fn patch(adapters: &Adapters, settings: &HostkitConfig, args: PatchArgs) -> anyhow::Result<()> {
    let validator: Arc<dyn ConfigValidator> = match &args.validate {
        Some(cmd) => {
            let parts: Vec<String> = cmd.split_whitespace().map(String::from).collect();
            Arc::new(
                CommandValidator::from_command(&parts, adapters.runner.clone())
                    .context("--validate must name a program")?,
            )
        }
        None => Arc::new(NoValidation),
    };
    let patcher = adapters.patcher(
        settings.backup.patch_config(&args.file, args.directives),
        validator,
    );

    if args.dry_run {
        for o in patcher.preview()? {
            println!("  {:<40} {:?}", o.directive.line(), o.outcome);
        }
        return Ok(());
    }

    let report = patcher
        .run()
        .with_context(|| format!("patching {} failed", args.file.display()))?;
    for o in &report.outcomes {
        println!("  {:<40} {:?}", o.directive.line(), o.outcome);
    }
    println!("Backup: {}", report.backup.backup.path.display());
    for pruned in &report.backup.pruned {
        println!("Pruned: {}", pruned.display());
    }
    info!(
        "{} {}",
        report.file_path.display(),
        if report.changed() { "changed" } else { "unchanged" }
    );
    Ok(())
}

fn restore(adapters: &Adapters, settings: &HostkitConfig, args: FileArgs) -> anyhow::Result<()> {
    let patcher = adapters.patcher(
        settings.backup.patch_config(&args.file, Vec::new()),
        Arc::new(NoValidation),
    );
    if !patcher.restore() {
        bail!("could not restore {} from its original backup", args.file.display());
    }
    println!("Restored {} from its original backup.", args.file.display());
    Ok(())
}

fn backups(adapters: &Adapters, settings: &HostkitConfig, args: FileArgs) -> anyhow::Result<()> {
    let patcher = adapters.patcher(
        settings.backup.patch_config(&args.file, Vec::new()),
        Arc::new(NoValidation),
    );
    let entries = patcher.backups()?;
    if entries.is_empty() {
        println!("No backups of {}.", args.file.display());
    }
    for entry in entries {
        let tag = if entry.name.is_original() { "original" } else { "rotating" };
        println!("{tag:<9} {}", entry.path.display());
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_patch_parses_repeated_directives() {
        // Arrange / Act
        let cli = Cli::parse_from([
            "hostkit",
            "patch",
            "--file",
            "/etc/ssh/sshd_config",
            "--set",
            "PermitRootLogin=yes",
            "--set",
            "Port 2222",
            "--dry-run",
        ]);

        // Assert
        match cli.command {
            Command::Patch(args) => {
                assert_eq!(args.directives.len(), 2);
                assert_eq!(args.directives[1].line(), "Port 2222");
                assert!(args.dry_run);
                assert!(args.validate.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_malformed_directive() {
        let result = Cli::try_parse_from(["hostkit", "patch", "--file", "f", "--set", "Port"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["hostkit", "runtime", "install", "-y", "-vv"]);
        assert!(cli.yes);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Runtime(RuntimeCommand::Install)));
    }

    #[test]
    fn test_cli_default_config_path() {
        let cli = Cli::parse_from(["hostkit", "sshd"]);
        // HOSTKIT_CONFIG may be set in the environment running the tests.
        if std::env::var_os("HOSTKIT_CONFIG").is_none() {
            assert_eq!(cli.config, PathBuf::from("/etc/hostkit/config.toml"));
        }
    }
}
