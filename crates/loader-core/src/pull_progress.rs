//! Layer tracking over the human-oriented `docker pull` progress stream.
//!
//! Grammar: a line is `<layer-id>: <status>` with exactly one colon and a
//! 12-character layer id. Two status classes matter:
//!
//! - registration: `Waiting`, `Pulling fs layer`
//! - completion: `Download complete`, `Pull complete`
//!
//! Each registered layer expects two completions (download, then extract),
//! so the expected total is `2 × layers`. Everything else is ignored.

use std::collections::HashSet;

const LAYER_ID_LEN: usize = 12;
const REGISTER: [&str; 2] = ["Waiting", "Pulling fs layer"];
const COMPLETE: [&str; 2] = ["Download complete", "Pull complete"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullEvent<'a> {
    Register(&'a str),
    Complete(&'a str),
}

pub fn parse_line(line: &str) -> Option<PullEvent<'_>> {
    let line = line.trim();
    let (layer, status) = line.split_once(':')?;
    if status.contains(':') {
        return None;
    }
    let layer = layer.trim();
    let status = status.trim();
    if layer.chars().count() != LAYER_ID_LEN {
        return None;
    }
    if REGISTER.contains(&status) {
        Some(PullEvent::Register(layer))
    } else if COMPLETE.contains(&status) {
        Some(PullEvent::Complete(layer))
    } else {
        None
    }
}

/// Counter state for one pull.
#[derive(Debug, Default)]
pub struct PullTracker {
    layers: HashSet<String>,
    completed: u64,
}

impl PullTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns whether the counters changed.
    pub fn observe(&mut self, line: &str) -> bool {
        match parse_line(line) {
            Some(PullEvent::Register(layer)) => self.layers.insert(layer.to_string()),
            Some(PullEvent::Complete(_)) => {
                self.completed += 1;
                true
            }
            None => false,
        }
    }

    /// Expected units; 1 until the first layer is registered.
    pub fn total(&self) -> u64 {
        if self.layers.is_empty() {
            1
        } else {
            2 * self.layers.len() as u64
        }
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn layers(&self) -> usize {
        self.layers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PULL: &str = "\
daffy-arm32v7: Pulling from duckietown/dt-core
a3ed95caeb02: Pulling fs layer
5b5b6a8b1b1e: Pulling fs layer
f1e2d3c4b5a6: Waiting
a3ed95caeb02: Verifying Checksum
a3ed95caeb02: Download complete
5b5b6a8b1b1e: Download complete
a3ed95caeb02: Pull complete
f1e2d3c4b5a6: Download complete
5b5b6a8b1b1e: Pull complete
f1e2d3c4b5a6: Pull complete
Digest: sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef
Status: Downloaded newer image for duckietown/dt-core:daffy-arm32v7
docker.io/duckietown/dt-core:daffy-arm32v7
";

    #[test]
    fn full_stream_reaches_total() {
        let mut tracker = PullTracker::new();
        for line in PULL.lines() {
            tracker.observe(line);
        }
        assert_eq!(tracker.layers(), 3);
        assert_eq!(tracker.total(), 6);
        assert_eq!(tracker.completed(), 6);
    }

    #[test]
    fn total_grows_as_layers_appear() {
        let mut tracker = PullTracker::new();
        assert_eq!(tracker.total(), 1);
        tracker.observe("a3ed95caeb02: Pulling fs layer");
        assert_eq!(tracker.total(), 2);
        tracker.observe("5b5b6a8b1b1e: Waiting");
        assert_eq!(tracker.total(), 4);
    }

    #[test]
    fn repeated_registration_is_counted_once() {
        let mut tracker = PullTracker::new();
        assert!(tracker.observe("a3ed95caeb02: Pulling fs layer"));
        assert!(!tracker.observe("a3ed95caeb02: Waiting"));
        assert_eq!(tracker.total(), 2);
    }

    #[test]
    fn already_exists_layers_do_not_register() {
        let mut tracker = PullTracker::new();
        assert!(!tracker.observe("a3ed95caeb02: Already exists"));
        assert_eq!(tracker.total(), 1);
    }

    #[test]
    fn lines_with_extra_colons_are_ignored() {
        assert_eq!(parse_line("Digest: sha256:abc"), None);
        assert_eq!(parse_line("Status: Image is up to date for a:b"), None);
    }

    #[test]
    fn layer_id_must_be_twelve_chars() {
        assert_eq!(parse_line("a3ed95caeb0: Pull complete"), None);
        assert_eq!(parse_line("a3ed95caeb023: Pull complete"), None);
        assert_eq!(
            parse_line("a3ed95caeb02: Pull complete"),
            Some(PullEvent::Complete("a3ed95caeb02"))
        );
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(
            parse_line("  a3ed95caeb02 :  Waiting \r"),
            Some(PullEvent::Register("a3ed95caeb02"))
        );
    }

    #[test]
    fn progress_bar_lines_are_ignored() {
        assert_eq!(
            parse_line("a3ed95caeb02: Downloading [=====>     ]  1.2MB/4.5MB"),
            None
        );
        assert_eq!(parse_line("a3ed95caeb02: Extracting"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("no colon here"), None);
    }

    #[test]
    fn status_match_is_exact() {
        assert_eq!(parse_line("a3ed95caeb02: waiting"), None);
        assert_eq!(parse_line("a3ed95caeb02: Pull complete!"), None);
    }

    #[test]
    fn completions_without_registration_still_tick() {
        let mut tracker = PullTracker::new();
        assert!(tracker.observe("a3ed95caeb02: Download complete"));
        assert_eq!(tracker.completed(), 1);
        assert_eq!(tracker.total(), 1);
    }
}
