//! Periodic pretty-printed status on stdout for a local operator.
//!
//! Unlike the network view, the console always carries collaborator output.

use std::time::Duration;

use loader_core::{Shutdown, StatusProjector};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

pub struct ConsoleReporter {
    projector: StatusProjector,
    interval: Duration,
}

impl ConsoleReporter {
    pub fn new(projector: StatusProjector) -> Self {
        Self {
            projector,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One snapshot as pretty JSON.
    pub fn render(&self) -> anyhow::Result<String> {
        render_snapshot(&self.projector)
    }

    /// Print a snapshot every interval until shutdown.
    pub async fn run(self, shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.triggered() => break,
            }
            // Host metrics are sampled on every render.
            let projector = self.projector.clone();
            let rendered = tokio::task::spawn_blocking(move || render_snapshot(&projector))
                .await
                .map_err(|e| anyhow::anyhow!("task join error: {e}"))
                .and_then(|res| res);
            match rendered {
                Ok(text) => println!("{text}"),
                Err(e) => tracing::warn!("console status: {e}"),
            }
        }
        tracing::debug!("console reporter stopped");
    }
}

fn render_snapshot(projector: &StatusProjector) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&projector.snapshot())?)
}
