//! Outer retry loop: scan, run, report, wait, repeat.
//!
//! `Scanning -> Running -> (Ready | Error) -> Waiting -> Scanning` until
//! shutdown. A failure anywhere marks every progress level with an error
//! descriptor and retries the whole cycle from a fresh scan after the short
//! backoff; nothing from the failed cycle is resumed.

use std::time::Duration;

use serde::Serialize;

use crate::board::{BoardReader, BoardWriter};
use crate::error::{LoaderError, Result};
use crate::housekeeping::BootLog;
use crate::plan::CyclePlan;
use crate::runtime::{ContainerRuntime, StackOrchestrator};
use crate::scan::RunConfiguration;
use crate::sequencer::{CycleReport, Sequencer};
use crate::settings::LoaderSettings;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Scanning,
    Running,
    Ready,
    Error,
    Waiting,
}

pub struct CycleController<R, S> {
    settings: LoaderSettings,
    runtime: R,
    orchestrator: S,
    board: BoardWriter,
    boot_log: BootLog,
    shutdown: Shutdown,
    state: CycleState,
}

impl<R, S> CycleController<R, S>
where
    R: ContainerRuntime,
    S: StackOrchestrator,
{
    pub fn new(
        settings: LoaderSettings,
        runtime: R,
        orchestrator: S,
        board: BoardWriter,
        shutdown: Shutdown,
    ) -> Self {
        let boot_log = BootLog::new(&settings.boot_log);
        Self {
            settings,
            runtime,
            orchestrator,
            board,
            boot_log,
            shutdown,
            state: CycleState::Scanning,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn reader(&self) -> BoardReader {
        self.board.reader()
    }

    /// Run one cycle and publish its outcome on the board.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        match self.execute().await {
            Ok(report) => {
                self.board.complete();
                self.state = CycleState::Ready;
                tracing::info!(
                    archives = report.archives_loaded,
                    pulled = report.images_pulled,
                    present = report.images_present,
                    started = report.stacks_started,
                    stacks = report.stacks_completed,
                    "cycle complete"
                );
                Ok(report)
            }
            Err(LoaderError::Cancelled) => Err(LoaderError::Cancelled),
            Err(e) => {
                self.board.fail(&e.to_string());
                self.state = CycleState::Error;
                tracing::error!("cycle failed: {e}");
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<CycleReport> {
        self.state = CycleState::Scanning;
        let config = RunConfiguration::scan(&self.settings)?;
        let plan = CyclePlan::build(&config)?;

        self.state = CycleState::Running;
        Sequencer::new(
            &self.runtime,
            &self.orchestrator,
            &self.board,
            &self.boot_log,
            &self.shutdown,
        )
        .run(&plan)
        .await
    }

    /// Loop until shutdown.
    pub async fn run(mut self) {
        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            let wait = match self.run_cycle().await {
                Ok(_) => self.settings.recheck_period,
                Err(LoaderError::Cancelled) => break,
                Err(_) => self.settings.retry_period,
            };
            if !self.wait(wait).await {
                break;
            }
        }
        tracing::info!("cycle controller stopped");
    }

    /// Sleep for `period`; false if shutdown arrived first.
    async fn wait(&mut self, period: Duration) -> bool {
        self.state = CycleState::Waiting;
        tracing::debug!(secs = period.as_secs_f64(), "waiting before next cycle");
        tokio::select! {
            _ = tokio::time::sleep(period) => true,
            _ = self.shutdown.triggered() => false,
        }
    }
}
