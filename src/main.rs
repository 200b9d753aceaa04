use anyhow::{Context, Result};
use junos_rollback::cli::{
    Args, ArgsSource, ConfigDiscovery, ExecutionMode, ModuleArgs, RollbackConfig,
};
use junos_rollback::{ErrorClass, NetconfClient, ResultPayload, RollbackTransaction, TransactionLog};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries only the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("junos_rollback=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    match mode {
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
        ExecutionMode::Rollback(config) => {
            let (payload, exit_code) = run_rollback(config).await;
            let json = serde_json::to_string(&payload).context("Failed to encode result")?;
            println!("{}", json);
            std::process::exit(exit_code);
        }
    }
}

/// Resolve parameters, run one transaction and reduce it to the result the
/// orchestrator reads. Failures before the transaction use the same payload.
async fn run_rollback(config: RollbackConfig) -> (ResultPayload, i32) {
    let module_args = match config.source {
        ArgsSource::Flags(module_args) => module_args,
        ArgsSource::File(path) => match ModuleArgs::from_json_file(&path) {
            Ok(module_args) => module_args,
            Err(e) => return early_failure(e.to_string(), e.class()),
        },
    };

    let defaults = match ConfigDiscovery::load(config.config_override.as_deref()) {
        Ok(defaults) => defaults,
        Err(e) => {
            return early_failure(
                format!("Unable to load configuration: {:#}", e),
                ErrorClass::Unexpected,
            );
        }
    };

    let resolved = match module_args.resolve(&defaults) {
        Ok(resolved) => resolved,
        Err(e) => {
            return early_failure(
                format!("Invalid parameters for {}: {}", module_args.host_label(), e),
                e.class(),
            );
        }
    };

    let host = resolved.connection.host.clone();
    let log = match resolved.logfile {
        Some(ref path) => match TransactionLog::with_logfile(&host, path).await {
            Ok(log) => log,
            Err(e) => {
                return early_failure(
                    format!("Unable to open log file {}: {}", path.display(), e),
                    ErrorClass::Unexpected,
                );
            }
        },
        None => TransactionLog::new(&host),
    };

    let client = NetconfClient::new(defaults.netconf_config());
    info!(
        "Rolling back {} to rollback {}{}",
        host,
        resolved.request.rollback_id,
        if resolved.request.check_mode { " (check mode)" } else { "" }
    );

    let report = RollbackTransaction::new(resolved.connection, resolved.request, log)
        .run(&client)
        .await;

    (report.outcome.to_payload(), report.outcome.exit_code())
}

fn early_failure(msg: String, class: ErrorClass) -> (ResultPayload, i32) {
    error!("{} ({})", msg, class);
    (ResultPayload::failure(msg, Some(class)), 1)
}
