// Finalized recordings and their metadata

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::format::extension_for;

/// Artifact identifier: milliseconds since the Unix epoch, unique per process
pub type ArtifactId = i64;

/// Where the artifact currently shown in preview came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewSource {
    Recording,
    History,
}

/// A finalized recording including its encoded payload
#[derive(Clone, PartialEq)]
pub struct Artifact {
    pub id: ArtifactId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub mime_type: String,
    pub size_bytes: u64,
    pub payload: Vec<u8>,
}

impl Artifact {
    /// Concatenate segments in delivery order into one payload
    pub fn from_segments(
        id: ArtifactId,
        name: String,
        created_at: DateTime<Utc>,
        mime_type: String,
        segments: Vec<Vec<u8>>,
    ) -> Self {
        let payload = segments.concat();
        Self {
            id,
            name,
            created_at,
            mime_type,
            size_bytes: payload.len() as u64,
            payload,
        }
    }

    /// Metadata without the payload
    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            id: self.id,
            name: self.name.clone(),
            created_at: self.created_at,
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes,
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// Artifact metadata as listed in history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSummary {
    pub id: ArtifactId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl ArtifactSummary {
    /// Human readable size, e.g. "1.2 KB"
    pub fn display_size(&self) -> String {
        format_bytes(self.size_bytes)
    }

    /// Creation time in the local time zone
    pub fn display_created_at(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

/// Format a byte count using 1024-based units up to GB
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// ISO-8601 UTC timestamp with millisecond precision, the history sort key
pub fn format_created_at(created_at: &DateTime<Utc>) -> String {
    created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Derive the display/download file name, e.g. `REC_SR1_20240105_143012.mp4`
pub fn derive_file_name(prefix: &str, mime_type: &str, at: NaiveDateTime) -> String {
    format!(
        "{}_{}.{}",
        prefix,
        at.format("%Y%m%d_%H%M%S"),
        extension_for(mime_type)
    )
}

/// Hands out time-derived artifact ids that never repeat within the process
#[derive(Debug, Default)]
pub struct ArtifactIdGenerator {
    last: AtomicI64,
}

impl ArtifactIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Millisecond timestamp of `now`, bumped past the last id if needed
    pub fn next_id(&self, now: DateTime<Utc>) -> ArtifactId {
        let candidate = now.timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        candidate.max(previous + 1)
    }
}

#[cfg(test)]
#[path = "artifact_test.rs"]
mod tests;
