use serde::{Deserialize, Serialize};

/// A decoded track event. `delta_time` is ticks since the previous event in the same track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiEvent {
    #[serde(rename = "deltaTime")]
    pub delta_time: u32,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl MidiEvent {
    pub fn new(delta_time: u32, kind: EventKind) -> Self {
        Self { delta_time, kind }
    }

    pub fn is_note(&self) -> bool {
        matches!(self.kind, EventKind::NoteOn { .. } | EventKind::NoteOff { .. })
    }
}

/// The event shapes the analysis cares about. Everything else decodes to `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    #[serde(rename_all = "camelCase")]
    NoteOn {
        channel: u8,
        note_number: u8,
        velocity: u8,
    },
    #[serde(rename_all = "camelCase")]
    NoteOff {
        channel: u8,
        note_number: u8,
        velocity: u8,
    },
    #[serde(rename_all = "camelCase")]
    ProgramChange { channel: u8, program_number: u8 },
    #[serde(rename_all = "camelCase")]
    SetTempo { microseconds_per_beat: u32 },
    /// `key` is the signed sharps (+) / flats (-) count, `scale` is 0 for major, 1 for minor.
    KeySignature { key: i8, scale: u8 },
    Other,
}

/// Ordered events of one MTrk chunk.
pub type Track = Vec<MidiEvent>;

/// Header data that survives decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    /// Ticks per quarter note.
    Metrical(u16),
    /// SMPTE frames per second and ticks per frame.
    Timecode { fps: u8, ticks_per_frame: u8 },
}

/// A fully decoded Standard MIDI File.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiFile {
    pub format: u8,
    pub timing: Timing,
    pub tracks: Vec<Track>,
}

/// Whether a structure entry starts or ends a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteKind {
    NoteOn,
    NoteOff,
}

/// A note-on or note-off, as it appears in `structure` and in section bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub note_number: u8,
    pub velocity: u8,
    pub delta_time: u32,
    #[serde(rename = "type")]
    pub kind: NoteKind,
    pub channel: u8,
}

impl NoteEvent {
    /// Project a decoded event onto the note view. Non-note events yield `None`.
    pub fn from_event(event: &MidiEvent) -> Option<Self> {
        let (kind, channel, note_number, velocity) = match event.kind {
            EventKind::NoteOn {
                channel,
                note_number,
                velocity,
            } => (NoteKind::NoteOn, channel, note_number, velocity),
            EventKind::NoteOff {
                channel,
                note_number,
                velocity,
            } => (NoteKind::NoteOff, channel, note_number, velocity),
            _ => return None,
        };

        Some(Self {
            note_number,
            velocity,
            delta_time: event.delta_time,
            kind,
            channel,
        })
    }

    pub fn is_note_on(&self) -> bool {
        self.kind == NoteKind::NoteOn
    }
}
