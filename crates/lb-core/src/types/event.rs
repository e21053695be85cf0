//! Records handed to the event sink.

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::{CollectibleFile, MarkerKind};

/// One collected file, ready for the sink.
///
/// Serializes to the wire shape downstream consumers read:
///
/// ```json
/// {"timestamp": "...", "type": "list", "filename": "a.list",
///  "path": "/data/list/a.list", "modtime": "...", "content": "..."}
/// ```
///
/// `content` is written as text; bytes that are not valid UTF-8 are
/// replaced with U+FFFD on serialization only; the event itself keeps the
/// raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEvent {
    /// When the event was built.
    pub timestamp: DateTime<Utc>,

    /// Marker kind the file was found under.
    #[serde(rename = "type")]
    pub kind: MarkerKind,

    /// File name.
    pub filename: String,

    /// Full path of the file.
    pub path: Utf8PathBuf,

    /// Modification time of the collected revision.
    pub modtime: DateTime<Utc>,

    /// Raw file content.
    #[serde(serialize_with = "serialize_content")]
    pub content: Vec<u8>,
}

impl OutboundEvent {
    /// Builds an event from a file that has just been read.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use lb_core::{CandidateFile, CollectibleFile, MarkerKind, OutboundEvent};
    ///
    /// let modified = Utc::now();
    /// let file = CollectibleFile::new(
    ///     CandidateFile::new("/data/LOG", "run.log", modified),
    ///     b"done".to_vec(),
    /// );
    /// let event = OutboundEvent::from_file(file, MarkerKind::Log, Utc::now());
    /// assert_eq!(event.path.as_str(), "/data/LOG/run.log");
    /// assert_eq!(event.modtime, modified);
    /// ```
    #[must_use]
    pub fn from_file(file: CollectibleFile, kind: MarkerKind, emitted_at: DateTime<Utc>) -> Self {
        let path = file.file.full_path();
        Self {
            timestamp: emitted_at,
            kind,
            filename: file.file.filename,
            path,
            modtime: file.file.modified,
            content: file.content,
        }
    }

    /// Copies every field except `content`, which is left empty.
    #[must_use]
    pub fn without_content(&self) -> Self {
        Self {
            timestamp: self.timestamp,
            kind: self.kind,
            filename: self.filename.clone(),
            path: self.path.clone(),
            modtime: self.modtime,
            content: Vec::new(),
        }
    }
}

fn serialize_content<S: Serializer>(content: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(content))
}
