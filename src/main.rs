use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use exchange_sim::{
    api,
    cli::{Cli, Commands},
    config::SimConfig,
    state::AppState,
    utils::shutdown_token,
};

fn load_config(path: Option<PathBuf>) -> anyhow::Result<SimConfig> {
    match path {
        Some(p) => SimConfig::from_json_file(&p),
        None => Ok(SimConfig::default()),
    }
}

async fn serve(state: AppState, port: u16, token: CancellationToken) -> anyhow::Result<()> {
    let app = api::router(state);
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "HTTP/WS server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(token.cancelled_owned())
        .await?;
    Ok(())
}

/// Runs the driver's per-second loop on a blocking thread, publishing
/// each second's L3 messages to the broadcast channel. The core is
/// synchronous by design — this is its only touchpoint with the async
/// runtime.
fn run_driver_blocking(state: AppState, token: CancellationToken, max_seconds: Option<u64>) {
    let mut elapsed = 0u64;
    loop {
        if token.is_cancelled() {
            break;
        }
        if max_seconds.is_some_and(|max| elapsed >= max) {
            break;
        }
        let messages = {
            let mut driver = state.driver.blocking_lock();
            if driver.is_finished() {
                break;
            }
            driver.step_second()
        };
        for msg in messages {
            let _ = state.l3_tx.send(msg);
        }
        elapsed += 1;
    }
    tracing::info!(elapsed, "driver loop stopped");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let token = shutdown_token();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => {
            let cfg = load_config(config)?;
            let state = AppState::new(cfg);
            let driver_state = state.clone();
            let driver_token = token.clone();
            tokio::task::spawn_blocking(move || {
                run_driver_blocking(driver_state, driver_token, None)
            });
            serve(state, port, token).await?;
        }
        Commands::Run {
            seconds,
            config,
            serve: serve_flag,
            port,
        } => {
            let cfg = load_config(config)?;
            let state = AppState::new(cfg);
            let max_seconds = if seconds == 0 { None } else { Some(seconds) };
            let driver_state = state.clone();
            let driver_token = token.clone();
            let driver_handle = tokio::task::spawn_blocking(move || {
                run_driver_blocking(driver_state, driver_token, max_seconds)
            });

            if serve_flag {
                serve(state, port, token).await?;
            } else {
                driver_handle.await?;
            }
        }
    }
    Ok(())
}
