//! Event Logger
//!
//! Append-only JSONL event logging.

use bevy_ecs::prelude::*;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use upgrade_events::UpgradeEvent;

/// Resource for logging events to a JSONL file
#[derive(Resource)]
pub struct EventLogger {
    writer: Option<BufWriter<File>>,
    event_count: u64,
}

impl EventLogger {
    /// Create a new event logger writing to the specified path
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            event_count: 0,
        })
    }

    /// Create a logger that discards events
    pub fn null() -> Self {
        Self {
            writer: None,
            event_count: 0,
        }
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn log(&mut self, event: &UpgradeEvent) -> std::io::Result<()> {
        self.event_count += 1;
        if let Some(ref mut writer) = self.writer {
            let json = serde_json::to_string(event)?;
            writeln!(writer, "{}", json)?;
        }
        Ok(())
    }

    pub fn log_batch(&mut self, events: &[UpgradeEvent]) -> std::io::Result<()> {
        for event in events {
            self.log(event)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("Failed to flush event logger: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use upgrade_events::{Quality, UpgradeEventKind};

    fn quality_event(id: &str) -> UpgradeEvent {
        UpgradeEvent::new(
            id,
            600,
            Some(3),
            UpgradeEventKind::QualityIncreased {
                from: Quality::Normal,
                to: Quality::Good,
            },
        )
    }

    #[test]
    fn test_event_logging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let mut logger = EventLogger::new(&path).unwrap();
        logger
            .log_batch(&[quality_event("evt_00000001"), quality_event("evt_00000002")])
            .unwrap();
        logger.flush().unwrap();

        let file = File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 2);

        let parsed = UpgradeEvent::from_jsonl(&lines[1]).unwrap();
        assert_eq!(parsed.event_id, "evt_00000002");
        assert_eq!(parsed.thing_id, Some(3));
    }

    #[test]
    fn test_null_logger() {
        let mut logger = EventLogger::null();
        logger.log(&quality_event("evt_1")).unwrap();
        assert_eq!(logger.event_count(), 1);
    }
}
