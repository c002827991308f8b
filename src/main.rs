//! bundle-deploy CLI entrypoint.
//!
//! This is the main entrypoint for the bundle-deploy command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bundle_deploy::api::{HttpControlPlaneClient, RecordingLogger};
use bundle_deploy::bundle::{BundleData, BundleParser, check_constraints, find_bundle_file};
use bundle_deploy::changes::Change;
use bundle_deploy::cli::{Cli, Commands, OutputFormat, OutputFormatter};
use bundle_deploy::deployer::{BundleDeployer, DeploymentPlan};
use bundle_deploy::error::{BundleError, Result};

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(id) = e.as_deploy().and_then(|d| d.change_id()) {
                error!("Deployment stopped at change {id}; earlier changes were applied");
            }
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(cli.bundle.as_ref(), warnings, &formatter),
        Commands::Plan { changes } => {
            cmd_plan(cli.bundle.as_ref(), changes.as_ref(), &formatter)
        }
        Commands::Deploy { yes, changes } => {
            cmd_deploy(cli.bundle.as_ref(), changes.as_ref(), yes, cli.output, &formatter).await
        }
    }
}

/// Verify the bundle.
fn cmd_validate(
    bundle_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let bundle = load_bundle(bundle_path)?;
    let result = bundle.verify(check_constraints)?;

    emit(&formatter.format_validation(&bundle, &result, show_warnings))
}

/// Show the change list.
fn cmd_plan(
    bundle_path: Option<&PathBuf>,
    changes_path: Option<&PathBuf>,
    formatter: &OutputFormatter,
) -> Result<()> {
    if let Some(path) = changes_path {
        let changes = BundleParser::new().load_changes(path)?;
        return emit(&formatter.format_plan(None, &changes));
    }

    let bundle = load_bundle(bundle_path)?;
    let plan = DeploymentPlan::from_bundle(&bundle)?;

    emit(&formatter.format_plan(Some(&plan.bundle_hash), &plan.changes))
}

/// Deploy the bundle.
async fn cmd_deploy(
    bundle_path: Option<&PathBuf>,
    changes_path: Option<&PathBuf>,
    auto_approve: bool,
    format: OutputFormat,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (bundle_hash, changes): (Option<String>, Vec<Change>) = if let Some(path) = changes_path {
        load_env(path)?;
        (None, BundleParser::new().load_changes(path)?)
    } else {
        let bundle = load_bundle(bundle_path)?;
        let plan = DeploymentPlan::from_bundle(&bundle)?;
        (Some(plan.bundle_hash), plan.changes)
    };

    if changes.is_empty() {
        eprintln!("Nothing to deploy.");
        return Ok(());
    }

    // Confirm
    if !auto_approve {
        eprintln!("{}", formatter.format_plan(bundle_hash.as_deref(), &changes));
        eprint!("Do you want to deploy these {} changes? [y/N]: ", changes.len());
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Deploy cancelled.");
            return Ok(());
        }
    }

    let client = create_client()?;
    let logger = if format == OutputFormat::Json {
        RecordingLogger::new()
    } else {
        RecordingLogger::forwarding()
    };

    let deployer = BundleDeployer::new(&client, &logger);
    let report = deployer.apply_changes(bundle_hash, &changes).await?;

    emit(&formatter.format_report(&report, &logger.lines()))
}

/// Loads the bundle and the `.env` file next to it.
fn load_bundle(bundle_path: Option<&PathBuf>) -> Result<BundleData> {
    let path = bundle_path.map_or_else(|| find_bundle_file("."), |path| Ok(path.clone()))?;
    load_env(&path)?;

    BundleParser::new().load_with_env(&path)
}

/// Loads the `.env` file next to an input file.
fn load_env(input: &Path) -> Result<()> {
    let parser = BundleParser::new()
        .with_base_path(input.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()
}

/// Creates the control-plane client from the environment.
fn create_client() -> Result<HttpControlPlaneClient> {
    let url = BundleParser::get_api_url()?;
    let token = BundleParser::get_api_token()?;
    info!("Using control plane at {url}");

    HttpControlPlaneClient::new(&url, &token).map_err(BundleError::from)
}

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    debug!("Writing {} bytes of output", output.len());
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
