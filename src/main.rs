use anyhow::{Context, Result};
use scripthost::cli::{Args, CheckConfig, CheckReport, ConfigDiscovery, ExecutionMode};
use scripthost::{HostConfig, ScriptHost, SessionOpenOptions, SessionStore};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let result = match mode {
        ExecutionMode::Check(config) => run_check(config, args.verbose).await,
        ExecutionMode::Defaults { config_override } => {
            run_defaults(config_override.as_deref(), args.verbose).await
        }
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(true)
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(config: &HostConfig, verbose: bool) {
    let default_filter = if verbose {
        "scripthost=debug"
    } else {
        config.log_filter.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns whether the script's directives resolved without errors
async fn run_check(config: CheckConfig, verbose: bool) -> Result<bool> {
    let mut host_config = ConfigDiscovery::load(config.config_override.as_deref())?;
    host_config.extra_references.extend(config.extra_references);
    host_config.reprocess_on_open = false;
    init_logging(&host_config, verbose);

    let text = tokio::fs::read_to_string(&config.script)
        .await
        .with_context(|| format!("Failed to read script {}", config.script.display()))?;
    let working_directory = script_directory(&config.script);

    let host = ScriptHost::new(host_config).await?;
    let id = host.open(SessionOpenOptions::new(text, working_directory));
    info!("Checking {} in session {}", config.script.display(), id);

    host.reprocess(id).await.context("Session closed before reprocessing")?;
    let session = host.get(id).context("Session disappeared")?;
    let report = CheckReport::from_session(&session).await;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }

    host.close(id);
    host.shutdown();
    Ok(!report.has_errors())
}

async fn run_defaults(config_override: Option<&Path>, verbose: bool) -> Result<bool> {
    let mut host_config = ConfigDiscovery::load(config_override)?;
    host_config.reprocess_on_open = false;
    init_logging(&host_config, verbose);

    let host = ScriptHost::new(host_config).await?;
    let defaults = host.default_references();

    println!("Default references ({}):", defaults.len());
    for entry in defaults.references() {
        let facade = if defaults.is_facade(entry.name()) { " [facade]" } else { "" };
        println!("  {} -> {}{}", entry.name(), entry.path().display(), facade);
    }
    println!("Default imports ({}):", defaults.imports().len());
    for import in defaults.imports() {
        println!("  {}", import);
    }

    host.shutdown();
    Ok(true)
}

fn script_directory(script: &Path) -> PathBuf {
    match script.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
