use std::sync::Arc;

use anyhow::Context;
use loader_core::docker::{ComposeCli, DockerCli};
use loader_core::metrics::SystemMetrics;
use loader_core::{board, shutdown_channel, CycleController, StatusProjector};
use loader_server::console::ConsoleReporter;

use crate::LoaderArgs;

pub fn run(args: &LoaderArgs) -> anyhow::Result<()> {
    let settings = args.settings();
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async move {
        let (writer, reader) = board();
        let (trigger, shutdown) = shutdown_channel();
        let metrics = SystemMetrics::new(&settings.data_dir, &args.temperature_file);
        let projector = StatusProjector::new(reader, Arc::new(metrics));

        tracing::info!(
            data_dir = %settings.data_dir.display(),
            excluded = ?settings.policy.excluded().collect::<Vec<_>>(),
            delete = settings.policy.delete_after_load,
            "code loader starting"
        );

        let server = if args.no_status_api {
            None
        } else {
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
                .await
                .with_context(|| format!("cannot bind status port {}", args.port))?;
            Some(tokio::spawn(loader_server::serve_on(
                listener,
                projector.clone(),
                args.include_output,
                shutdown.clone(),
            )))
        };

        let console = args.console.then(|| {
            tokio::spawn(ConsoleReporter::new(projector.clone()).run(shutdown.clone()))
        });

        let controller = CycleController::new(
            settings,
            DockerCli::default(),
            ComposeCli::default(),
            writer,
            shutdown.clone(),
        );

        let signals = tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!("shutdown requested");
            trigger.trigger();
        });

        controller.run().await;
        // dropping the trigger also releases every observer
        signals.abort();

        if let Some(console) = console {
            let _ = console.await;
        }
        if let Some(server) = server {
            server.await.context("status endpoint task failed")??;
        }
        Ok(())
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
