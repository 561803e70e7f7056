//! Single-writer, multi-reader publication of the progress tree.
//!
//! The worker owns the only [`BoardWriter`]; every mutation is applied to the
//! published value in place and becomes visible to readers as a whole.
//! Observers hold a [`BoardReader`] and only ever receive owned copies, so
//! they never see the structure mid-write and never hold it across an await.

use tokio::sync::watch;

use crate::progress::{Level, ProgressTree};

/// Everything an observer needs to describe the worker's state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressBoard {
    pub tree: ProgressTree,
    /// A cycle is in flight.
    pub busy: bool,
    /// The last cycle failed and no cycle has succeeded since.
    pub error: bool,
}

/// Create a board starting out busy, as the daemon is from the moment it
/// boots until its first cycle completes.
pub fn board() -> (BoardWriter, BoardReader) {
    let initial = ProgressBoard {
        busy: true,
        ..ProgressBoard::default()
    };
    let (tx, rx) = watch::channel(initial);
    (BoardWriter { tx }, BoardReader { rx })
}

/// Exclusive mutation handle. Deliberately not `Clone`.
#[derive(Debug)]
pub struct BoardWriter {
    tx: watch::Sender<ProgressBoard>,
}

impl BoardWriter {
    pub fn update(&self, f: impl FnOnce(&mut ProgressBoard)) {
        self.tx.send_modify(f);
    }

    pub fn set_total(&self, level: Level, total: u64) {
        self.update(|b| b.tree.set_total(level, total));
    }

    pub fn set_tick(&self, level: Level, tick: u64) {
        self.update(|b| b.tree.set_tick(level, tick));
    }

    pub fn tick(&self, level: Level) {
        self.update(|b| b.tree.tick(level));
    }

    pub fn set_action(&self, level: Level, action: impl Into<String>) {
        let action = action.into();
        self.update(|b| b.tree.set_action(level, action));
    }

    pub fn set_status(&self, level: Level, action: impl Into<String>) {
        let action = action.into();
        self.update(|b| b.tree.set_status(level, action));
    }

    pub fn set_output(&self, level: Level, output: Option<String>) {
        self.update(|b| b.tree.set_output(level, output));
    }

    pub fn set_busy(&self, busy: bool) {
        self.update(|b| b.busy = busy);
    }

    /// Mark the cycle failed: error descriptor on every level, error flag set.
    pub fn fail(&self, message: &str) {
        self.update(|b| {
            b.tree.fail(message);
            b.error = true;
        });
    }

    /// Mark the cycle finished successfully.
    pub fn complete(&self) {
        self.update(|b| {
            b.busy = false;
            b.error = false;
        });
    }

    /// A reader attached to this writer.
    pub fn reader(&self) -> BoardReader {
        BoardReader {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoardReader {
    rx: watch::Receiver<ProgressBoard>,
}

impl BoardReader {
    /// Owned copy of the current board.
    pub fn snapshot(&self) -> ProgressBoard {
        self.rx.borrow().clone()
    }
}
