//! Fixed-depth progress tree.
//!
//! Four levels, coarsest first: the whole cycle, the current phase, the
//! current archive or stack, and the current sub-operation (image pull or
//! stack bring-up). Each level carries a tick/total counter pair, a human
//! readable action and the diagnostic output of the last collaborator call
//! made at that level.

use serde::Serialize;

/// Number of levels in the tree.
pub const LEVELS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Cycle,
    Phase,
    Item,
    Step,
}

impl Level {
    pub const ALL: [Level; LEVELS] = [Level::Cycle, Level::Phase, Level::Item, Level::Step];

    pub fn index(self) -> usize {
        match self {
            Level::Cycle => 0,
            Level::Phase => 1,
            Level::Item => 2,
            Level::Step => 3,
        }
    }

    /// Levels strictly deeper than `self`.
    pub fn deeper(self) -> impl Iterator<Item = Level> {
        Level::ALL.into_iter().skip(self.index() + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressNode {
    pub level: usize,
    pub tick: u64,
    pub total: u64,
    pub action: Option<String>,
    pub output: Option<String>,
}

impl ProgressNode {
    fn new(level: Level) -> Self {
        Self {
            level: level.index(),
            tick: 0,
            total: 1,
            action: None,
            output: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTree {
    nodes: [ProgressNode; LEVELS],
}

impl Default for ProgressTree {
    fn default() -> Self {
        Self {
            nodes: Level::ALL.map(ProgressNode::new),
        }
    }
}

impl ProgressTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, level: Level) -> &ProgressNode {
        &self.nodes[level.index()]
    }

    pub fn nodes(&self) -> &[ProgressNode; LEVELS] {
        &self.nodes
    }

    pub fn set_total(&mut self, level: Level, total: u64) {
        self.nodes[level.index()].total = total;
    }

    pub fn set_tick(&mut self, level: Level, tick: u64) {
        self.nodes[level.index()].tick = tick;
    }

    pub fn tick(&mut self, level: Level) {
        let node = &mut self.nodes[level.index()];
        node.tick = node.tick.saturating_add(1);
    }

    /// Set the action at `level`, clearing the action and tick of every
    /// deeper level so a stale child is never shown under a new parent.
    pub fn set_action(&mut self, level: Level, action: impl Into<String>) {
        for deeper in level.deeper() {
            let node = &mut self.nodes[deeper.index()];
            node.action = None;
            node.tick = 0;
        }
        self.nodes[level.index()].action = Some(action.into());
    }

    /// Start a new unit of work at `level`: tick back to zero, new action,
    /// output cleared.
    pub fn set_status(&mut self, level: Level, action: impl Into<String>) {
        self.set_tick(level, 0);
        self.set_action(level, action);
        self.nodes[level.index()].output = None;
    }

    pub fn set_output(&mut self, level: Level, output: Option<String>) {
        self.nodes[level.index()].output = output;
    }

    /// Append one line to the output at `level`, starting it if absent.
    pub fn append_output(&mut self, level: Level, line: &str) {
        let output = self.nodes[level.index()].output.get_or_insert_with(String::new);
        output.push('\n');
        output.push_str(line);
    }

    /// Put an error descriptor on every level.
    pub fn fail(&mut self, message: &str) {
        for level in Level::ALL {
            self.set_action(level, format!("ERROR: {message}"));
        }
    }
}
