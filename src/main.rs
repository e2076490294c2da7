//! rolesync CLI entrypoint.
//!
//! This is the main entrypoint for the rolesync command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rolesync::cache::FileRoleCache;
use rolesync::cli::{CacheCommands, Cli, Commands, LogFormat, OutputFormatter};
use rolesync::config::{
    find_config_file, ConfigHasher, ConfigParser, ConfigValidator, RoleSyncConfig,
};
use rolesync::error::{Result, RoleSyncError, EXIT_RESET};
use rolesync::source::RoleSourceMaterializer;
use rolesync::sync::SyncOrchestrator;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Orchestrator wired to the on-disk roles directory.
type FsOrchestrator = SyncOrchestrator<RoleSourceMaterializer, FileRoleCache>;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    init_logging(cli.verbose, cli.log_format);

    let formatter = OutputFormatter::new(cli.output);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            let err = RoleSyncError::internal(format!("Failed to create async runtime: {e}"));
            print!("{}", formatter.error(&err, 1));
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, &formatter)) {
        Ok(code) => ExitCode::from(code),
        Err(failure) => {
            print!("{}", formatter.error(&failure.error, failure.exit_code));
            ExitCode::from(failure.exit_code)
        }
    }
}

/// A command failure and the process exit code it maps to.
struct CommandFailure {
    error: RoleSyncError,
    exit_code: u8,
}

impl From<RoleSyncError> for CommandFailure {
    fn from(error: RoleSyncError) -> Self {
        let exit_code = error.exit_code();
        Self { error, exit_code }
    }
}

/// Initializes the logging system.
///
/// Logs go to stderr so stdout stays reserved for command output.
/// `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> std::result::Result<u8, CommandFailure> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force, formatter).map_err(Into::into),
        Commands::Validate { warnings } => {
            cmd_validate(config_path, warnings, formatter).map_err(Into::into)
        }
        Commands::Plan => cmd_plan(config_path, formatter).await.map_err(Into::into),
        Commands::Sync => cmd_sync(config_path, formatter).await.map_err(Into::into),
        Commands::Clean { yes } => cmd_clean(config_path, yes, formatter).await,
        Commands::Cache { command } => match command {
            CacheCommands::Show => cmd_cache_show(config_path, formatter)
                .await
                .map_err(Into::into),
        },
    }
}

/// Writes a starter configuration file.
fn cmd_init(path: &Path, force: bool, formatter: &OutputFormatter) -> Result<u8> {
    info!("Initializing rolesync configuration in: {}", path.display());

    let config_path = path.join("rolesync.yaml");

    if !force && config_path.exists() {
        print!(
            "{}",
            formatter.warning(&format!(
                "Configuration file already exists: {} (use --force to overwrite)",
                config_path.display()
            ))
        );
        return Ok(0);
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    let config_template = include_str!("../templates/rolesync.yaml");
    std::fs::write(&config_path, config_template)?;

    print!(
        "{}",
        formatter.success(&format!("Created: {}", config_path.display()))
    );
    if !formatter.is_json() {
        println!("\nNext steps:");
        println!("  1. Edit rolesync.yaml with your roles");
        println!("  2. Run 'rolesync validate' to check your configuration");
        println!("  3. Run 'rolesync plan' to see what will be installed");
        println!("  4. Run 'rolesync sync' to install the roles");
    }

    Ok(0)
}

/// Validates the configuration.
fn cmd_validate(
    config_path: Option<&Path>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<u8> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().validate(&config)?;
    print!(
        "{}",
        formatter.format_validation(&config, &result, show_warnings)
    );

    Ok(0)
}

/// Shows the actions the next sync would apply.
async fn cmd_plan(config_path: Option<&Path>, formatter: &OutputFormatter) -> Result<u8> {
    let (config, orchestrator) = load_orchestrator(config_path)?;

    let plan = orchestrator.plan(&config.roles).await?;
    print!("{}", formatter.format_plan(&plan));

    Ok(0)
}

/// Runs one synchronization pass.
async fn cmd_sync(config_path: Option<&Path>, formatter: &OutputFormatter) -> Result<u8> {
    let (config, orchestrator) = load_orchestrator(config_path)?;

    let report = orchestrator.sync(&config.roles).await;
    print!("{}", formatter.format_report(&report));

    Ok(report.exit_code())
}

/// Removes every role and the role cache.
async fn cmd_clean(
    config_path: Option<&Path>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> std::result::Result<u8, CommandFailure> {
    let (config, orchestrator) = load_orchestrator(config_path)?;

    if !auto_approve && !confirm(&format!(
        "This will delete every role under {}. Continue? [y/N]: ",
        config.paths.roles_dir
    ))? {
        print!("{}", formatter.warning("Clean cancelled."));
        return Ok(0);
    }

    match orchestrator.reset().await {
        Ok(true) => {
            print!("{}", formatter.success("All roles and the role cache removed."));
            Ok(0)
        }
        Ok(false) => {
            print!("{}", formatter.warning("No role cache found, nothing to clean."));
            Ok(0)
        }
        Err(error) => Err(CommandFailure {
            error,
            exit_code: EXIT_RESET,
        }),
    }
}

/// Shows the cached roles.
async fn cmd_cache_show(config_path: Option<&Path>, formatter: &OutputFormatter) -> Result<u8> {
    let (config, orchestrator) = load_orchestrator(config_path)?;

    let cache = orchestrator.cached().await?;
    let desired_hash = ConfigHasher::new().hash_roles(&config.roles);
    print!("{}", formatter.format_cache(cache.as_ref(), &desired_hash));

    Ok(0)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&Path>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.to_path_buf()))
}

/// Creates a parser rooted at the configuration file's directory.
fn parser_for(config_file: &Path) -> ConfigParser {
    ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")))
}

/// Loads the configuration and wires an orchestrator to its roles directory.
fn load_orchestrator(config_path: Option<&Path>) -> Result<(RoleSyncConfig, FsOrchestrator)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let materializer = RoleSourceMaterializer::from_paths(&config.paths)?;
    let store = FileRoleCache::from_paths(&config.paths)?;
    debug!("Roles directory: {}", materializer.roles_dir().display());

    Ok((config, SyncOrchestrator::new(materializer, store)))
}

/// Asks for a y/N confirmation on stderr.
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}
