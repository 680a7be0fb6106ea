use anyhow::{bail, Result};
use fleetpulse_agent::config::AgentConfig;
use fleetpulse_agent::scheduler::{AgentContext, Scheduler};
use tokio::signal;
use tokio::sync::watch;

const DEFAULT_CONFIG_PATH: &str = "config/agent.toml";

struct Cli {
    config_path: String,
    once: bool,
}

fn parse_cli() -> Result<Cli> {
    let mut cli = Cli {
        config_path: DEFAULT_CONFIG_PATH.to_string(),
        once: false,
    };
    let mut positional = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--once" => cli.once = true,
            flag if flag.starts_with('-') => bail!("unknown argument: {flag}"),
            path if !positional => {
                cli.config_path = path.to_string();
                positional = true;
            }
            extra => bail!("unexpected argument: {extra}"),
        }
    }
    Ok(cli)
}

#[tokio::main]
async fn main() -> Result<()> {
    fleetpulse_agent::init_tracing()?;

    let cli = parse_cli()?;
    let config = AgentConfig::load(&cli.config_path)?;
    tracing::info!(
        config = %cli.config_path,
        endpoint = %config.ingest_url,
        "fleetpulse-agent starting"
    );

    let mut scheduler = Scheduler::new(AgentContext::from_config(config)?);

    if cli.once {
        let report = scheduler.run_once().await;
        tracing::info!(
            queued = ?report.queued,
            delivered = report.flush.as_ref().map(|o| o.delivered_records()).unwrap_or(0),
            "Single run complete"
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down gracefully");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}
