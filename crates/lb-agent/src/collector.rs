//! Reading changed files and handing them to the sink.

use chrono::Utc;
use lb_core::{CandidateFile, CollectibleFile, MarkerKind, OutboundEvent};
use lb_scanner::{RegistrarStore, ScanError};

use crate::sink::Sink;

/// Reads candidate files, records them and publishes their events.
///
/// The order is fixed: read, then record, then publish. A file that cannot
/// be read leaves the registrar untouched and is retried on the next cycle.
/// Once recorded, a file is not collected again until its modification time
/// moves, even if the sink dropped the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collector;

impl Collector {
    /// Creates a collector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Collects one file.
    ///
    /// Returns the published event's metadata; its `content` is empty
    /// because the bytes were moved into the sink.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Read`] if the file cannot be read. The registrar
    /// and the sink are not touched in that case.
    pub fn collect<S: Sink + ?Sized>(
        &self,
        candidate: CandidateFile,
        kind: MarkerKind,
        registrar: &mut RegistrarStore,
        sink: &mut S,
    ) -> Result<OutboundEvent, ScanError> {
        let path = candidate.full_path();
        let content = std::fs::read(&path).map_err(|e| {
            tracing::warn!(path = %path, error = %e, "Failed to read file, will retry");
            ScanError::read(&path, e)
        })?;

        registrar.record(candidate.dir(), &candidate.filename, candidate.modified);

        let event = OutboundEvent::from_file(CollectibleFile::new(candidate, content), kind, Utc::now());
        let summary = event.without_content();

        tracing::debug!(
            path = %event.path,
            kind = %kind,
            bytes = event.content.len(),
            modtime = %event.modtime,
            "Collected file"
        );
        sink.publish(event);

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::{Utf8Path, Utf8PathBuf};
    use chrono::{DateTime, TimeZone};

    use super::*;
    use crate::sink::ChannelSink;

    fn modified() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn marker_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("list")).unwrap();
        fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_collect_records_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker_dir(&dir);
        fs::write(marker.join("a.list"), "one\ntwo\n").unwrap();

        let mut registrar = RegistrarStore::new("unused.json");
        let (mut sink, mut rx) = ChannelSink::new();
        let candidate = CandidateFile::new(marker.clone(), "a.list", modified());

        let summary = Collector::new()
            .collect(candidate, MarkerKind::List, &mut registrar, &mut sink)
            .unwrap();

        assert_eq!(summary.path, marker.join("a.list"));
        assert!(summary.content.is_empty());
        assert_eq!(registrar.lookup(&marker, "a.list"), Some(modified()));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.content, b"one\ntwo\n");
        assert_eq!(event.modtime, modified());
        assert_eq!(event.kind, MarkerKind::List);
    }

    #[test]
    fn test_read_failure_leaves_registrar_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker_dir(&dir);

        let mut registrar = RegistrarStore::new("unused.json");
        let (mut sink, mut rx) = ChannelSink::new();
        let candidate = CandidateFile::new(marker.clone(), "vanished.list", modified());

        let err = Collector::new()
            .collect(candidate, MarkerKind::List, &mut registrar, &mut sink)
            .unwrap_err();

        assert!(matches!(err, ScanError::Read { .. }));
        assert!(registrar.lookup(Utf8Path::new(&marker), "vanished.list").is_none());
        assert!(!registrar.is_dirty());
        assert!(rx.try_recv().is_err());
    }
}
