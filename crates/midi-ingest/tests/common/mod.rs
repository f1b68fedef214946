#![allow(dead_code)]

use midi_analysis::testing::{smf, TrackBuilder};
use midi_ingest::{Broadcaster, FileHandle, Notification};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Captures every broadcast in order.
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<Notification>>,
}

impl RecordingBroadcaster {
    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|n| n.event).collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|n| n.event == event).count()
    }

    /// Poll until `event` has been seen `times` times, or panic after a few seconds.
    pub async fn wait_for(&self, event: &str, times: usize) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while self.count(event) < times {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {times} x {event}: {:?}", self.names()));
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, event: &str, payload: Value) {
        self.events.lock().unwrap().push(Notification {
            event: event.to_string(),
            payload,
        });
    }
}

/// One track: 120 BPM, C major, piano, and a single middle C.
pub fn simple_song() -> Vec<u8> {
    let track = TrackBuilder::new()
        .tempo(0, 500_000)
        .key_signature(0, 0, false)
        .program_change(0, 0, 0)
        .note_on(0, 0, 60, 100)
        .note_off(480, 0, 60, 0)
        .finish();
    smf(480, &[track])
}

pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> FileHandle {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    FileHandle::new(name, path, bytes.len() as u64)
}
