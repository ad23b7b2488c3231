use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{decode_message_json, InboundMessage, ProtoError};

/// One inbound message captured with its transport sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub seq: u64,
    pub message: InboundMessage,
}

/// Ordered capture of a client session, replayable into a fresh pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedSession {
    #[serde(default)]
    pub entries: Vec<SessionEntry>,
}

impl RecordedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message with the next sequence number and returns it.
    pub fn record(&mut self, message: InboundMessage) -> u64 {
        let seq = self.entries.last().map_or(0, |entry| entry.seq + 1);
        self.entries.push(SessionEntry { seq, message });
        seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.entries.iter().map(|entry| entry.seq).max()
    }

    /// Entries in sequence order. Entries sharing a sequence number keep
    /// their recorded order.
    pub fn ordered(&self) -> Vec<&SessionEntry> {
        let mut entries: Vec<&SessionEntry> = self.entries.iter().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }

    pub fn from_json_str(data: &str) -> Result<Self, ProtoError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Reads one wire message per non-blank line; the sequence number is the
    /// zero-based index among non-blank lines.
    pub fn from_ndjson_str(data: &str) -> Result<Self, ProtoError> {
        let mut session = Self::new();
        for (index, line) in data.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let message =
                decode_message_json(trimmed).map_err(|source| ProtoError::SessionLine {
                    line: index + 1,
                    source: Box::new(source),
                })?;
            session.record(message);
        }
        Ok(session)
    }

    /// Loads a session document; files ending in `.ndjson` or `.jsonl` are
    /// read line by line.
    pub fn from_file(path: &Path) -> Result<Self, ProtoError> {
        let contents = fs::read_to_string(path).map_err(|source| ProtoError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("ndjson") | Some("jsonl") => Self::from_ndjson_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }
}
