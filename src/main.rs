mod config;
mod console;
mod detector;
mod error;
mod filter;
mod optimistic;
mod plan;
mod reconciler;
mod scheduler;
mod server;
mod source;
mod state;
mod types;
mod view;
mod web;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::console::{Console, EVENT_CHANNEL_CAPACITY};
use crate::scheduler::PollingScheduler;
use crate::source::RemoteStateSource;
use crate::types::Resource;
use crate::view::ViewModel;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.parse().unwrap_or_default()),
        )
        .with_target(false)
        .init();

    let port = config.http_port;

    tracing::info!(
        remote = %config.remote_base_url,
        flags = config.flags.len(),
        lists = config.lists.len(),
        grace_ms = config.grace().as_millis() as u64,
        port,
        "fleet-console starting"
    );

    let cancel = CancellationToken::new();
    let source = Arc::new(RemoteStateSource::new(&config.remote_base_url, config.request_timeout())?);
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (view_tx, view_rx) = watch::channel(ViewModel::new());

    // Flags first: their baseline must exist before a toggle can be accepted.
    let mut scheduler = PollingScheduler::new(source.clone(), events_tx.clone(), cancel.clone());
    for flag in &config.flags {
        scheduler.register(Resource::Flag(flag.clone()), config.flag_poll_interval());
    }
    for list in &config.lists {
        scheduler.register(Resource::List(list.clone()), config.list_poll_interval());
    }
    let scheduler = Arc::new(scheduler);

    let actor = tokio::spawn(console::run(
        Console::new(&config),
        source,
        events_rx,
        events_tx.clone(),
        view_tx,
        cancel.clone(),
    ));

    {
        let scheduler = scheduler.clone();
        let probe_attempts = config.probe_attempts;
        let probe_retry = config.probe_retry();
        tokio::spawn(async move {
            if let Err(e) = scheduler.bootstrap(probe_attempts, probe_retry).await {
                tracing::warn!(error = %e, "bootstrap did not complete");
            }
        });
    }

    let app_state = state::AppState::new(config, events_tx, view_rx, scheduler.clone());
    let router = server::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("HTTP server listening on 0.0.0.0:{port}");
    tracing::info!("open http://localhost:{port} in your browser");

    let shutdown = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutdown requested");
            shutdown.cancel();
        })
        .await?;

    scheduler.shutdown().await;
    if let Err(e) = actor.await {
        tracing::warn!(error = %e, "console actor panicked");
    }

    Ok(())
}
