use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::maze::Direction;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    MoveTo { direction: Direction },
    LookAt { direction: Direction },
    FailForward,
    FailBackward,
    /// Sentinel that forces one last finish evaluation during replay.
    Check,
    Finish,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CommandRecord {
    #[serde(flatten)]
    pub kind: CommandKind,
    /// Source block, only used for highlighting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
}

impl CommandRecord {
    pub fn new(kind: CommandKind, block_id: Option<&str>) -> Self {
        Self {
            kind,
            block_id: block_id.map(str::to_string),
        }
    }
}

/// Transcript of one run. Built by execution, drained by replay; the only
/// append after execution is the single `Finish` queued by replay.
#[derive(Clone, Debug, Default)]
pub struct CommandLog {
    records: VecDeque<CommandRecord>,
    finish_queued: bool,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: CommandKind, block_id: Option<&str>) {
        debug_assert!(kind != CommandKind::Finish, "Finish is queued by replay only");
        self.records.push_back(CommandRecord::new(kind, block_id));
    }

    /// Append the victory record. Returns false if one was already queued.
    pub fn queue_finish(&mut self) -> bool {
        if self.finish_queued {
            return false;
        }
        self.finish_queued = true;
        self.records.push_back(CommandRecord::new(CommandKind::Finish, None));
        true
    }

    pub fn finish_queued(&self) -> bool {
        self.finish_queued
    }

    pub(crate) fn pop_front(&mut self) -> Option<CommandRecord> {
        self.records.pop_front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandRecord> {
        self.records.iter()
    }

    pub fn kinds(&self) -> Vec<CommandKind> {
        self.records.iter().map(|r| r.kind).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self.records)
    }
}
