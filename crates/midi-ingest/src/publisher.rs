//! Turns task outcomes into named notifications.
//!
//! The publisher knows nothing about how notifications travel; it hands
//! them to a [`Broadcaster`], which is the SSE hub in the server and a
//! recorder in tests.

use midi_analysis::AnalysisResult;
use serde_json::{json, Value};
use std::sync::Arc;

pub const FILE_PROCESSED: &str = "file-processed";
pub const FILE_ERROR: &str = "file-error";
pub const PROCESSING_COMPLETE: &str = "processing-complete";

pub const DRAIN_MESSAGE: &str = "All files have been processed.";

/// Fan-out to whoever is currently listening. Best effort, at most once.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, event: &str, payload: Value);
}

#[derive(Clone)]
pub struct EventPublisher {
    broadcaster: Arc<dyn Broadcaster>,
}

impl EventPublisher {
    pub fn new(broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { broadcaster }
    }

    pub fn emit_success(&self, file: &str, result: &AnalysisResult) {
        let data = match serde_json::to_value(result) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(task.file = %file, error = %e, "Analysis result not serializable");
                self.emit_failure(file, &format!("failed to serialize analysis: {e}"));
                return;
            }
        };

        tracing::debug!(task.file = %file, event = FILE_PROCESSED, "Publishing");
        self.broadcaster
            .broadcast(FILE_PROCESSED, json!({ "file": file, "data": data }));
    }

    pub fn emit_failure(&self, file: &str, error: &str) {
        tracing::debug!(task.file = %file, event = FILE_ERROR, "Publishing");
        self.broadcaster
            .broadcast(FILE_ERROR, json!({ "file": file, "error": error }));
    }

    pub fn emit_drain(&self) {
        tracing::info!("{}", DRAIN_MESSAGE);
        self.broadcaster
            .broadcast(PROCESSING_COMPLETE, json!({ "message": DRAIN_MESSAGE }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(String, Value)>>);

    impl Broadcaster for Capture {
        fn broadcast(&self, event: &str, payload: Value) {
            self.0.lock().unwrap().push((event.to_string(), payload));
        }
    }

    #[test]
    fn payload_shapes() {
        let capture = Arc::new(Capture::default());
        let publisher = EventPublisher::new(capture.clone());

        let result = AnalysisResult {
            tempos: vec![120.0],
            ..Default::default()
        };
        publisher.emit_success("song.mid", &result);
        publisher.emit_failure("broken.mid", "MIDI decode error: expected MThd");
        publisher.emit_drain();

        let events = capture.0.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                (
                    FILE_PROCESSED.to_string(),
                    json!({
                        "file": "song.mid",
                        "data": {
                            "tempos": [120.0],
                            "keySignatures": [],
                            "instruments": [],
                            "structure": [],
                            "sections": [],
                        }
                    })
                ),
                (
                    FILE_ERROR.to_string(),
                    json!({ "file": "broken.mid", "error": "MIDI decode error: expected MThd" })
                ),
                (
                    PROCESSING_COMPLETE.to_string(),
                    json!({ "message": "All files have been processed." })
                ),
            ]
        );
    }
}
