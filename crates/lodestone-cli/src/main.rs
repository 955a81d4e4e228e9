//! Lodestone - local-AI extension pack manager
//!
//! Usage:
//!   lodestone install <target-dir>      # Install the pack
//!   lodestone discover                  # Find local inference backends
//!   lodestone configure-local-ai        # Point the pack at a backend
//!   lodestone validate [target-dir]     # Check the installation
//!   lodestone uninstall <target-dir>    # Remove, reduce, or disable

mod interactive;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lodestone_core::discovery::{DiscoveryEngine, Provider, ServiceDescriptor};
use lodestone_core::doctor::DoctorCommand;
use lodestone_core::error::LifecycleError;
use lodestone_core::install::{InstallCommand, InstallOptions};
use lodestone_core::switcher::{SwitchCommand, SwitchOptions, SwitchReport};
use lodestone_core::uninstall::{
    ComponentKind, UninstallCommand, UninstallMode, UninstallOptions, UninstallReport,
};
use lodestone_core::validate::{CheckStatus, Severity, ValidateCommand};

#[derive(Parser)]
#[command(name = "lodestone")]
#[command(about = "Local-AI extension pack manager", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the extension pack into a target directory
    Install {
        /// Installation root
        target_dir: PathBuf,

        /// Source artifact tree
        #[arg(long, default_value = "pack")]
        source: PathBuf,

        /// No prompts: confirm replacement, remediate dependencies, pick
        /// the first discovered backend
        #[arg(long)]
        auto: bool,

        /// Skip the dependency precheck
        #[arg(long)]
        skip_checks: bool,

        /// Skip post-install backend discovery and configuration
        #[arg(long)]
        skip_post: bool,

        /// Also sweep private subnets during discovery (slow, opt-in)
        #[arg(long)]
        lan: bool,
    },

    /// Uninstall the extension pack
    Uninstall {
        /// Installation root
        target_dir: PathBuf,

        /// Remove everything the installer owns
        #[arg(long, conflicts_with_all = ["partial", "disable", "component"])]
        complete: bool,

        /// Remove code and scripts, keep env file and tool registry
        #[arg(long, conflicts_with_all = ["disable", "component"])]
        partial: bool,

        /// Non-destructive disable, reversible with `enable`
        #[arg(long, conflicts_with = "component")]
        disable: bool,

        /// Remove one component (registry, hooks, commands, experts, scripts)
        #[arg(long, value_name = "NAME")]
        component: Option<String>,

        /// Report planned actions without mutating anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the pre-uninstall backup
        #[arg(long)]
        no_backup: bool,

        /// Proceed even if the tree is not recognizably managed
        #[arg(long)]
        force: bool,
    },

    /// Re-enable a disabled installation
    Enable {
        /// Installation root
        target_dir: PathBuf,
    },

    /// Point the configuration at a local inference backend
    ConfigureLocalAi {
        /// Installation root
        #[arg(long, default_value = ".")]
        target: PathBuf,

        /// Pick the first discovered backend without prompting
        #[arg(long)]
        auto: bool,

        /// Provider to configure manually (skips discovery)
        #[arg(long)]
        provider: Option<Provider>,

        /// Host for manual configuration
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Port for manual configuration
        #[arg(long)]
        port: Option<u16>,

        /// Model name
        #[arg(long)]
        model: Option<String>,

        /// Also sweep private subnets (slow, opt-in)
        #[arg(long)]
        lan: bool,
    },

    /// Probe for locally running inference backends
    Discover {
        /// Also sweep private subnets (slow, opt-in)
        #[arg(long)]
        lan: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Check for required external tools
    Doctor {
        /// Install missing required tools without prompting
        #[arg(long)]
        auto: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Check an installation and report pass/warn/fail per component
    Validate {
        /// Installation root
        #[arg(default_value = ".")]
        target_dir: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lodestone=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Install {
            target_dir,
            source,
            auto,
            skip_checks,
            skip_post,
            lan,
        } => run_install(target_dir, source, auto, skip_checks, skip_post, lan).await,
        Commands::Uninstall {
            target_dir,
            complete,
            partial,
            disable,
            component,
            dry_run,
            no_backup,
            force,
        } => run_uninstall(
            target_dir, complete, partial, disable, component, dry_run, no_backup, force,
        ),
        Commands::Enable { target_dir } => run_enable(target_dir),
        Commands::ConfigureLocalAi {
            target,
            auto,
            provider,
            host,
            port,
            model,
            lan,
        } => run_configure(target, auto, provider, host, port, model, lan).await,
        Commands::Discover { lan, format } => run_discover(lan, format).await,
        Commands::Doctor { auto, format } => run_doctor(auto, format),
        Commands::Validate { target_dir, format } => run_validate(target_dir, format).await,
    }
}

async fn run_install(
    target_dir: PathBuf,
    source: PathBuf,
    auto: bool,
    skip_checks: bool,
    skip_post: bool,
    lan: bool,
) -> Result<()> {
    if !skip_checks {
        let doctor = DoctorCommand::new(auto);
        let report = doctor.run();
        print_doctor_table(&report);
        if !report.all_required_present() {
            doctor.remediate(&report, interactive::confirm_tool_install)?;
        }
    }

    let command = InstallCommand::new(&target_dir);
    let options = InstallOptions::new(&source).with_confirm_replace(auto);
    let report = match command.execute(&options) {
        Ok(report) => report,
        Err(err) if !auto && is_conflict(&err) => {
            if !interactive::confirm_replace(&command.layout().config_dir())? {
                println!("Installation cancelled.");
                std::process::exit(1);
            }
            command.execute(&InstallOptions::new(&source).with_confirm_replace(true))?
        }
        Err(err) => return Err(err),
    };

    println!(
        "{} Installed extension pack into {}",
        style("✓").green(),
        report.target.display()
    );
    if let Some(backup) = &report.backup {
        println!("  Prior state backed up to {}", backup.display());
    }
    println!(
        "  {} scripts made executable, {} registry entries written",
        report.scripts_fixed,
        report.registry_entries.len()
    );
    for warning in &report.warnings {
        println!("  {} {}", style("⚠").yellow(), warning);
    }

    if skip_post {
        return Ok(());
    }

    let engine = DiscoveryEngine::default();
    let services = engine.discover(lan).await;
    if services.is_empty() {
        println!("No local inference backends detected; run `lodestone configure-local-ai` later.");
        return Ok(());
    }
    print_discovery_table(&services);

    let selected = if auto {
        Some(0)
    } else {
        interactive::select_service(&services)?
    };
    if let Some(index) = selected {
        let options = SwitchOptions::from_descriptor(&services[index]);
        let switch = SwitchCommand::new(command.layout().clone());
        let report = switch.execute(&options).await?;
        print_switch_report(&report);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_uninstall(
    target_dir: PathBuf,
    complete: bool,
    partial: bool,
    disable: bool,
    component: Option<String>,
    dry_run: bool,
    no_backup: bool,
    force: bool,
) -> Result<()> {
    let mode = if let Some(name) = component {
        UninstallMode::Component(name.parse::<ComponentKind>()?)
    } else if partial {
        UninstallMode::Partial
    } else if disable {
        UninstallMode::Disable
    } else if complete {
        UninstallMode::Complete
    } else {
        anyhow::bail!("Choose a mode: --complete, --partial, --disable, or --component NAME");
    };

    let command = UninstallCommand::new(target_dir);
    let options = UninstallOptions::new(mode)
        .with_dry_run(dry_run)
        .with_backup(!no_backup)
        .with_force(force);
    let report = command.execute(&options)?;
    print_uninstall_report(&report);
    Ok(())
}

fn run_enable(target_dir: PathBuf) -> Result<()> {
    let command = UninstallCommand::new(target_dir);
    let report = command.enable()?;
    println!("{} Installation re-enabled", style("✓").green());
    for action in &report.actions {
        println!("  {action}");
    }
    Ok(())
}

async fn run_configure(
    target: PathBuf,
    auto: bool,
    provider: Option<Provider>,
    host: String,
    port: Option<u16>,
    model: Option<String>,
    lan: bool,
) -> Result<()> {
    let layout = lodestone_core::layout::TargetLayout::new(target);
    let switch = SwitchCommand::new(layout);

    let options = if let Some(provider) = provider {
        // Manual configuration path; discovery is skipped entirely.
        let port = port.unwrap_or_else(|| provider.candidate_ports()[0]);
        let mut options = SwitchOptions::manual(provider, host, port);
        if let Some(model) = model {
            options = options.with_model(model);
        }
        options
    } else {
        let engine = DiscoveryEngine::default();
        let services = engine.discover(lan).await;
        if services.is_empty() {
            println!("No local inference backends detected.");
            println!("Start one (e.g. `ollama serve`) or pass --provider/--host/--port.");
            std::process::exit(1);
        }
        print_discovery_table(&services);

        let index = if auto {
            0
        } else {
            match interactive::select_service(&services)? {
                Some(index) => index,
                None => return Ok(()),
            }
        };
        let mut options = SwitchOptions::from_descriptor(&services[index]);
        if let Some(model) = model {
            options = options.with_model(model);
        } else if !auto {
            if let Some(model) = interactive::select_model(&services[index].models)? {
                options = options.with_model(model);
            }
        }
        options
    };

    let report = switch.execute(&options).await?;
    print_switch_report(&report);
    Ok(())
}

async fn run_discover(lan: bool, format: OutputFormat) -> Result<()> {
    let engine = DiscoveryEngine::default();
    let services = engine.discover(lan).await;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&services)?);
        }
        OutputFormat::Table => {
            if services.is_empty() {
                println!("No local inference backends detected.");
            } else {
                print_discovery_table(&services);
            }
        }
    }
    Ok(())
}

fn run_doctor(auto: bool, format: OutputFormat) -> Result<()> {
    let doctor = DoctorCommand::new(auto);
    let report = doctor.run();
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => print_doctor_table(&report),
    }
    if !report.all_required_present() {
        if auto {
            doctor.remediate(&report, |_| true)?;
        } else {
            doctor.remediate(&report, interactive::confirm_tool_install)?;
        }
    }
    Ok(())
}

async fn run_validate(target_dir: PathBuf, format: OutputFormat) -> Result<()> {
    let command = ValidateCommand::new(target_dir);
    let report = command.execute().await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            println!("Validation of {}", report.target.display());
            println!("{:<24} {:<10} {:<6} Detail", "Check", "Severity", "Status");
            println!("{}", "-".repeat(70));
            for check in &report.checks {
                let status = match check.status {
                    CheckStatus::Pass => style("pass").green(),
                    CheckStatus::Warn => style("warn").yellow(),
                    CheckStatus::Fail => style("fail").red(),
                };
                let severity = match check.severity {
                    Severity::Required => "required",
                    Severity::Optional => "optional",
                };
                println!(
                    "{:<24} {:<10} {:<6} {}",
                    check.name, severity, status, check.detail
                );
            }
        }
    }

    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn is_conflict(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<LifecycleError>(),
        Some(LifecycleError::ConflictingState(_))
    )
}

fn print_discovery_table(services: &[ServiceDescriptor]) {
    println!("{:<12} {:<24} {:<8} Models", "Provider", "Host", "Port");
    println!("{}", "-".repeat(70));
    for service in services {
        let models = if service.models.is_empty() {
            "-".to_string()
        } else {
            service.models.join(", ")
        };
        println!(
            "{:<12} {:<24} {:<8} {}",
            service.provider.label(),
            service.host,
            service.port,
            models
        );
    }
}

fn print_doctor_table(report: &lodestone_core::doctor::DoctorReport) {
    println!("OS: {}", report.os);
    for check in &report.checks {
        let mark = if check.present {
            style("✓").green()
        } else if check.required {
            style("✗").red()
        } else {
            style("•").yellow()
        };
        let kind = if check.required { "required" } else { "optional" };
        println!("  {mark} {:<10} ({kind})", check.tool);
    }
}

fn print_switch_report(report: &SwitchReport) {
    println!(
        "{} Configuration now points at {} ({})",
        style("✓").green(),
        report.provider.label(),
        report.base_url
    );
    if let Some(model) = &report.model {
        println!("  Model: {model}");
    }
    if report.connectivity {
        println!("  Connectivity: {}", style("ok").green());
    }
    if report.inference {
        println!("  Inference round-trip: {}", style("ok").green());
    }
    for warning in &report.warnings {
        println!("  {} {}", style("⚠").yellow(), warning);
    }
}

fn print_uninstall_report(report: &UninstallReport) {
    if report.dry_run {
        println!("Dry run; planned actions:");
    } else {
        println!("{} Uninstall finished ({:?})", style("✓").green(), report.state);
    }
    for action in &report.actions {
        println!("  {action}");
    }
    for warning in &report.warnings {
        println!("  {} {}", style("⚠").yellow(), warning);
    }
}
