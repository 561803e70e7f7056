//! `loader-core`: provisioning cycle and progress model for the code loader.
//!
//! ```text
//! CycleController ── scan ──▶ RunConfiguration ──▶ CyclePlan
//!       │
//!       ▼
//!   Sequencer ── ContainerRuntime / StackOrchestrator (docker, docker-compose)
//!       │
//!       ▼ (sole writer)
//!   BoardWriter ══ watch ══▶ BoardReader ──▶ StatusProjector ──▶ observers
//! ```

pub mod aggregate;
pub mod board;
pub mod controller;
pub mod docker;
pub mod error;
pub mod housekeeping;
pub mod manifest;
pub mod metrics;
pub mod plan;
pub mod progress;
pub mod pull_progress;
pub mod runtime;
pub mod scan;
pub mod sequencer;
pub mod settings;
pub mod shutdown;
pub mod status;

pub use board::{board, BoardReader, BoardWriter, ProgressBoard};
pub use controller::{CycleController, CycleState};
pub use error::{LoaderError, Result};
pub use progress::{Level, ProgressTree, LEVELS};
pub use settings::{LoaderSettings, Policy};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use status::{AggregateState, StatusProjector, StatusSnapshot};
