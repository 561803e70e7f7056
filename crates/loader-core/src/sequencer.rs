//! One provisioning cycle, executed phase by phase in a fixed order:
//!
//! 1. uncompressed archives
//! 2. compressed archives
//! 3. stacks to run (ensure images, bring up unless excluded)
//! 4. stacks to load (pull images)
//!
//! Every leaf unit (an archive loaded, an image ensured) ticks both its own
//! level and the cycle level, so the cycle percentage is continuous across
//! phases. The first collaborator failure aborts the cycle.

use std::path::{Path, PathBuf};

use crate::board::BoardWriter;
use crate::error::{LoaderError, Result};
use crate::housekeeping::{remove_artifact, BootLog, BootPhase};
use crate::plan::{CyclePlan, PlannedStack};
use crate::progress::Level;
use crate::pull_progress::PullTracker;
use crate::runtime::{ContainerRuntime, StackOrchestrator};
use crate::scan::file_name;
use crate::shutdown::Shutdown;

/// Pass through failures that abort the cycle; log and drop the rest.
fn tolerate(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if !e.aborts_cycle() => {
            tracing::warn!("{e}");
            Ok(())
        }
        other => other,
    }
}

/// What a completed cycle actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub archives_loaded: usize,
    pub images_pulled: usize,
    pub images_present: usize,
    pub stacks_started: usize,
    pub stacks_completed: usize,
}

pub struct Sequencer<'a> {
    runtime: &'a dyn ContainerRuntime,
    orchestrator: &'a dyn StackOrchestrator,
    board: &'a BoardWriter,
    boot_log: &'a BootLog,
    shutdown: &'a Shutdown,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        orchestrator: &'a dyn StackOrchestrator,
        board: &'a BoardWriter,
        boot_log: &'a BootLog,
        shutdown: &'a Shutdown,
    ) -> Self {
        Self {
            runtime,
            orchestrator,
            board,
            boot_log,
            shutdown,
        }
    }

    pub async fn run(&self, plan: &CyclePlan) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let board = self.board;

        board.set_busy(true);
        board.set_total(Level::Cycle, plan.root_total());
        board.set_status(Level::Cycle, "Loading Docker images");

        self.load_archives(
            &plan.uncompressed,
            "Loading uncompressed images (.tar)",
            plan.delete_after_load,
            &mut report,
        )
        .await?;
        self.load_archives(
            &plan.compressed,
            "Loading compressed images (.tar.gz)",
            plan.delete_after_load,
            &mut report,
        )
        .await?;

        board.set_total(Level::Phase, plan.stacks_to_run.len() as u64);
        board.set_status(Level::Phase, "Loading stacks we run at boot");
        for stack in &plan.stacks_to_run {
            self.run_stack(stack, &mut report).await?;
        }

        board.set_total(Level::Phase, plan.stacks_to_load.len() as u64);
        board.set_status(Level::Phase, "Loading other stacks");
        for stack in &plan.stacks_to_load {
            self.load_stack(stack, plan.delete_after_load, &mut report)
                .await?;
        }

        self.boot_log.record(BootPhase::Done, "All stacks up");
        Ok(report)
    }

    async fn load_archives(
        &self,
        archives: &[PathBuf],
        action: &str,
        delete: bool,
        report: &mut CycleReport,
    ) -> Result<()> {
        let board = self.board;
        board.set_total(Level::Phase, archives.len() as u64);
        board.set_status(Level::Phase, action);

        for archive in archives {
            self.check_shutdown()?;
            self.load_archive(archive).await?;
            if delete {
                tolerate(remove_artifact(archive))?;
            }
            board.tick(Level::Phase);
            board.tick(Level::Cycle);
            report.archives_loaded += 1;
            self.boot_log.record(
                BootPhase::Loading,
                format!("Archive loaded: {}", file_name(archive)),
            );
        }
        Ok(())
    }

    /// Stream one archive into the runtime; level 2 counts bytes.
    async fn load_archive(&self, archive: &Path) -> Result<()> {
        let board = self.board;
        let name = file_name(archive);
        board.set_status(Level::Item, format!("Loading archive: {name}"));

        let size = tokio::fs::metadata(archive)
            .await
            .map_err(|e| LoaderError::Load {
                archive: archive.to_path_buf(),
                reason: e.to_string(),
            })?
            .len();
        board.set_total(Level::Item, size);

        tracing::info!(archive = %name, bytes = size, "loading archive");
        let output = self
            .runtime
            .load_archive(
                archive,
                &mut |bytes| board.set_tick(Level::Item, bytes),
                self.shutdown,
            )
            .await?;
        board.set_output(Level::Item, Some(output));
        Ok(())
    }

    async fn run_stack(&self, stack: &PlannedStack, report: &mut CycleReport) -> Result<()> {
        let board = self.board;
        // one extra unit for the bring-up step
        board.set_total(Level::Item, stack.images.len() as u64 + 1);
        board.set_status(Level::Item, format!("Loading stack: {}", stack.name));

        for image in &stack.images {
            self.check_shutdown()?;
            if self.runtime.image_exists(image).await? {
                tracing::debug!(image = %image, "image already present");
                report.images_present += 1;
            } else {
                self.pull(image).await?;
                report.images_pulled += 1;
                self.boot_log
                    .record(BootPhase::Loading, format!("Image loaded: {image}"));
            }
            board.tick(Level::Item);
            board.tick(Level::Cycle);
        }

        if stack.excluded {
            tracing::info!(stack = %stack.name, "stack excluded from bring-up");
        } else {
            self.check_shutdown()?;
            self.bring_up(stack).await?;
            report.stacks_started += 1;
            self.boot_log
                .record(BootPhase::Loading, format!("Stack run: {}", stack.name));
        }
        board.tick(Level::Item);

        self.boot_log.record(
            BootPhase::Loading,
            format!("Stack completed: {}", stack.name),
        );
        report.stacks_completed += 1;
        board.tick(Level::Phase);
        Ok(())
    }

    async fn load_stack(
        &self,
        stack: &PlannedStack,
        delete: bool,
        report: &mut CycleReport,
    ) -> Result<()> {
        let board = self.board;
        board.set_total(Level::Item, stack.images.len() as u64);
        board.set_status(Level::Item, format!("Loading stack: {}", stack.name));

        for image in &stack.images {
            self.check_shutdown()?;
            self.pull(image).await?;
            board.tick(Level::Item);
            board.tick(Level::Cycle);
            report.images_pulled += 1;
            self.boot_log
                .record(BootPhase::Loading, format!("Image loaded: {image}"));
        }

        if delete {
            tolerate(remove_artifact(&stack.path))?;
        }
        self.boot_log.record(
            BootPhase::Loading,
            format!("Stack completed: {}", stack.name),
        );
        report.stacks_completed += 1;
        board.tick(Level::Phase);
        Ok(())
    }

    /// Pull one image; level 3 follows the layer stream.
    async fn pull(&self, image: &str) -> Result<()> {
        let board = self.board;
        board.set_action(Level::Step, format!("Pulling image: {image}"));
        board.update(|b| {
            b.tree.set_total(Level::Step, 1);
            b.tree.set_tick(Level::Step, 0);
            b.tree.set_output(Level::Step, Some(String::new()));
        });

        tracing::info!(image = %image, "pulling image");
        let mut tracker = PullTracker::new();
        let transcript = self
            .runtime
            .pull(image, &mut |line: &str| {
                let changed = tracker.observe(line);
                let (total, completed) = (tracker.total(), tracker.completed());
                board.update(|b| {
                    b.tree.append_output(Level::Step, line);
                    if changed {
                        b.tree.set_total(Level::Step, total);
                        b.tree.set_tick(Level::Step, completed);
                    }
                });
            })
            .await?;
        board.set_output(Level::Step, Some(transcript));
        Ok(())
    }

    async fn bring_up(&self, stack: &PlannedStack) -> Result<()> {
        let board = self.board;
        board.set_status(Level::Step, format!("Running stack: {}", stack.name));
        board.set_total(Level::Step, 1);

        tracing::info!(stack = %stack.name, "bringing up stack");
        let output = self
            .orchestrator
            .bring_up(&stack.path, &stack.name)
            .await?;
        board.set_output(Level::Step, Some(output));
        board.tick(Level::Step);
        Ok(())
    }

    fn check_shutdown(&self) -> Result<()> {
        if self.shutdown.is_triggered() {
            return Err(LoaderError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::board;
    use crate::runtime::{BytesProgress, LineProgress};
    use crate::shutdown::shutdown_channel;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Runtime double that records the order of calls.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerRuntime for Recorder {
        async fn load_archive(
            &self,
            archive: &Path,
            progress: &mut BytesProgress<'_>,
            _shutdown: &Shutdown,
        ) -> Result<String> {
            self.push(format!("load {}", file_name(archive)));
            progress(1);
            Ok(String::new())
        }

        async fn image_exists(&self, _reference: &str) -> Result<bool> {
            Ok(false)
        }

        async fn pull(&self, reference: &str, progress: &mut LineProgress<'_>) -> Result<String> {
            self.push(format!("pull {reference}"));
            progress("a3ed95caeb02: Pulling fs layer");
            progress("a3ed95caeb02: Download complete");
            Ok(String::new())
        }
    }

    #[async_trait]
    impl StackOrchestrator for Recorder {
        async fn bring_up(&self, _manifest: &Path, project: &str) -> Result<String> {
            self.push(format!("up {project}"));
            Ok(String::new())
        }
    }

    fn stack(name: &str, images: &[&str]) -> PlannedStack {
        PlannedStack {
            path: PathBuf::from(format!("/nonexistent/{name}.yaml")),
            name: name.to_string(),
            images: images.iter().map(|s| s.to_string()).collect(),
            excluded: false,
        }
    }

    #[tokio::test]
    async fn phases_run_in_fixed_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let tar = dir.path().join("a.tar");
        let tgz = dir.path().join("b.tar.gz");
        std::fs::write(&tar, b"x").unwrap();
        std::fs::write(&tgz, b"y").unwrap();

        let plan = CyclePlan {
            uncompressed: vec![tar],
            compressed: vec![tgz],
            stacks_to_run: vec![stack("core", &["core:1"])],
            stacks_to_load: vec![stack("extra", &["extra:1"])],
            delete_after_load: false,
        };
        let recorder = Recorder::default();
        let (writer, reader) = board();
        let (_trigger, shutdown) = shutdown_channel();
        let log = BootLog::new(dir.path().join("boot-log.txt"));

        Sequencer::new(&recorder, &recorder, &writer, &log, &shutdown)
            .run(&plan)
            .await
            .unwrap();

        assert_eq!(
            recorder.calls(),
            vec![
                "load a.tar",
                "load b.tar.gz",
                "pull core:1",
                "up core",
                "pull extra:1"
            ]
        );
        let snap = reader.snapshot();
        assert_eq!(snap.tree.node(Level::Cycle).tick, 4);
        assert_eq!(snap.tree.node(Level::Cycle).total, 4);
    }

    #[tokio::test]
    async fn pull_lines_drive_step_level() {
        let dir = tempfile::TempDir::new().unwrap();
        let plan = CyclePlan {
            uncompressed: vec![],
            compressed: vec![],
            stacks_to_run: vec![],
            stacks_to_load: vec![stack("extra", &["extra:1"])],
            delete_after_load: false,
        };
        let recorder = Recorder::default();
        let (writer, reader) = board();
        let (_trigger, shutdown) = shutdown_channel();
        let log = BootLog::new(dir.path().join("boot-log.txt"));

        Sequencer::new(&recorder, &recorder, &writer, &log, &shutdown)
            .run(&plan)
            .await
            .unwrap();

        let step = reader.snapshot().tree.node(Level::Step).clone();
        assert_eq!(step.total, 2);
        assert_eq!(step.tick, 1);
        assert_eq!(step.action.as_deref(), Some("Pulling image: extra:1"));
    }

    #[tokio::test]
    async fn empty_plan_still_reports_every_phase() {
        let dir = tempfile::TempDir::new().unwrap();
        let plan = CyclePlan {
            uncompressed: vec![],
            compressed: vec![],
            stacks_to_run: vec![],
            stacks_to_load: vec![],
            delete_after_load: true,
        };
        let recorder = Recorder::default();
        let (writer, reader) = board();
        let (_trigger, shutdown) = shutdown_channel();
        let log = BootLog::new(dir.path().join("boot-log.txt"));

        let report = Sequencer::new(&recorder, &recorder, &writer, &log, &shutdown)
            .run(&plan)
            .await
            .unwrap();

        assert_eq!(report, CycleReport::default());
        let snap = reader.snapshot();
        assert_eq!(
            snap.tree.node(Level::Phase).action.as_deref(),
            Some("Loading other stacks")
        );
        assert_eq!(snap.tree.node(Level::Phase).total, 0);
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_before_next_item() {
        let dir = tempfile::TempDir::new().unwrap();
        let plan = CyclePlan {
            uncompressed: vec![],
            compressed: vec![],
            stacks_to_run: vec![],
            stacks_to_load: vec![stack("extra", &["a:1", "b:1"])],
            delete_after_load: false,
        };
        let recorder = Recorder::default();
        let (writer, _reader) = board();
        let (trigger, shutdown) = shutdown_channel();
        trigger.trigger();
        let log = BootLog::new(dir.path().join("boot-log.txt"));

        let err = Sequencer::new(&recorder, &recorder, &writer, &log, &shutdown)
            .run(&plan)
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::Cancelled));
        assert!(recorder.calls().is_empty());
    }
}
