//! midi-ingest - MIDI upload and analysis service
//!
//! Library exposing the queue, notification hub, and HTTP router for the
//! binary and for integration tests.

pub mod error;
pub mod hub;
pub mod publisher;
pub mod queue;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod web;

pub use error::IngestError;
pub use hub::{Notification, SubscriberHub, Subscription};
pub use publisher::{Broadcaster, EventPublisher};
pub use queue::{
    MidiFileProcessor, ProcessingQueue, QueueConfig, QueueStats, TaskHandle, TaskOutcome,
    TaskProcessor,
};
pub use store::UploadStore;
pub use types::{FileHandle, TaskId};
