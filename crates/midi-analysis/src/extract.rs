//! Feature extraction over decoded tracks.
//!
//! Every sequence is built by flattening tracks in file order and filtering
//! by event type, so ordering is track order first, then intra-track order.

use crate::event::{EventKind, MidiEvent, NoteEvent, Track};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Major/minor mode of a key signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Major,
    Minor,
}

impl Scale {
    /// 0 is major; any other scale byte is minor.
    pub fn from_raw(scale: u8) -> Self {
        if scale == 0 {
            Scale::Major
        } else {
            Scale::Minor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    pub key: i8,
    pub scale: Scale,
}

/// A program change, reported with its raw delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentChange {
    pub channel: u8,
    pub instrument: u8,
    pub delta_time: u32,
}

/// Everything the one-pass walk produces. Sections are derived from `structure`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub tempos: Vec<f64>,
    pub key_signatures: Vec<KeySignature>,
    pub instruments: Vec<InstrumentChange>,
    pub structure: Vec<NoteEvent>,
}

/// Convert microseconds per quarter note to beats per minute.
///
/// A zero tempo yields `f64::INFINITY`, which serializes to JSON `null`.
pub fn tempo_to_bpm(microseconds_per_beat: u32) -> f64 {
    60_000_000.0 / microseconds_per_beat as f64
}

/// Walk all tracks once and collect tempo, key, instrument, and note sequences.
pub fn extract(tracks: &[Track]) -> Result<Features> {
    let mut features = Features::default();

    for event in tracks.iter().flatten() {
        visit(&mut features, event)?;
    }

    Ok(features)
}

fn visit(features: &mut Features, event: &MidiEvent) -> Result<()> {
    match event.kind {
        EventKind::SetTempo {
            microseconds_per_beat,
        } => {
            features.tempos.push(tempo_to_bpm(microseconds_per_beat));
        }
        EventKind::KeySignature { key, scale } => {
            features.key_signatures.push(KeySignature {
                key,
                scale: Scale::from_raw(scale),
            });
        }
        EventKind::ProgramChange {
            channel,
            program_number,
        } => {
            features.instruments.push(InstrumentChange {
                channel,
                instrument: program_number,
                delta_time: event.delta_time,
            });
        }
        EventKind::NoteOn { .. } | EventKind::NoteOff { .. } => {
            let note = NoteEvent::from_event(event).ok_or_else(|| {
                Error::Extraction(format!("note event without note fields: {:?}", event.kind))
            })?;
            features.structure.push(note);
        }
        EventKind::Other => {}
    }

    Ok(())
}
