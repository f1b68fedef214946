//! MIDI analysis: decode a Standard MIDI File, extract tempo/key/instrument/note
//! features, and segment the note structure into verse/chorus sections.

pub mod decode;
pub mod event;
pub mod extract;
pub mod sections;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use decode::{decode, decode_file};
pub use event::{EventKind, MidiEvent, MidiFile, NoteEvent, NoteKind, Timing, Track};
pub use extract::{extract, tempo_to_bpm, Features, InstrumentChange, KeySignature, Scale};
pub use sections::{segment, Section, SectionKind};

use serde::{Deserialize, Serialize};

/// Errors from MIDI analysis operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI decode error: {0}")]
    Decode(String),

    #[error("MIDI extraction error: {0}")]
    Extraction(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Per-file analysis record, serialized as the `data` of a `file-processed` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub tempos: Vec<f64>,
    pub key_signatures: Vec<KeySignature>,
    pub instruments: Vec<InstrumentChange>,
    pub structure: Vec<NoteEvent>,
    pub sections: Vec<Section>,
}

impl AnalysisResult {
    pub fn from_features(features: Features) -> Self {
        let sections = segment(&features.structure);
        Self {
            tempos: features.tempos,
            key_signatures: features.key_signatures,
            instruments: features.instruments,
            structure: features.structure,
            sections,
        }
    }
}

/// Decode, extract, and segment in one call.
pub fn analyze(bytes: &[u8]) -> Result<AnalysisResult> {
    let tracks = decode(bytes)?;
    let features = extract(&tracks)?;
    Ok(AnalysisResult::from_features(features))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{smf, TrackBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn single_tempo_and_note_pair() {
        let track = TrackBuilder::new()
            .tempo(0, 500_000)
            .note_on(0, 0, 60, 100)
            .note_off(480, 0, 60, 0)
            .finish();
        let result = analyze(&smf(480, &[track])).unwrap();

        assert_eq!(result.tempos, vec![120.0]);
        assert_eq!(result.structure.len(), 2);
        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.sections[0].kind, SectionKind::Verse);
        assert_eq!(result.sections[0].events, result.structure);
    }

    #[test]
    fn multi_track_file_flattens_in_track_order() {
        let conductor = TrackBuilder::new()
            .tempo(0, 600_000)
            .key_signature(0, 2, false)
            .tempo(1920, 400_000)
            .finish();
        let piano = TrackBuilder::new()
            .program_change(0, 0, 0)
            .note_on(0, 0, 60, 90)
            .note_off(240, 0, 60, 0)
            .finish();
        let bass = TrackBuilder::new()
            .program_change(0, 1, 33)
            .tempo(0, 500_000)
            .note_on(0, 1, 36, 110)
            .note_off(480, 1, 36, 0)
            .finish();

        let result = analyze(&smf(480, &[conductor, piano, bass])).unwrap();

        assert_eq!(result.tempos, vec![100.0, 150.0, 120.0]);
        assert_eq!(
            result.key_signatures,
            vec![KeySignature {
                key: 2,
                scale: Scale::Major
            }]
        );
        let programs: Vec<(u8, u8)> = result
            .instruments
            .iter()
            .map(|i| (i.channel, i.instrument))
            .collect();
        assert_eq!(programs, vec![(0, 0), (1, 33)]);
        let notes: Vec<u8> = result.structure.iter().map(|n| n.note_number).collect();
        assert_eq!(notes, vec![60, 60, 36, 36]);
    }

    #[test]
    fn hundred_and_one_note_ons_produce_chorus_then_remainder() {
        let mut track = TrackBuilder::new();
        for i in 0..101u8 {
            track = track.note_on(10, 0, 40 + (i % 40), 100);
        }
        track = track.note_off(10, 0, 40, 0).note_off(10, 0, 41, 0);

        let result = analyze(&smf(480, &[track.finish()])).unwrap();
        assert_eq!(result.structure.iter().filter(|n| n.is_note_on()).count(), 101);
        assert_eq!(result.sections.len(), 2);
        assert_eq!(result.sections[0].kind, SectionKind::Chorus);
        assert_eq!(result.sections[0].events.len(), 101);
    }

    #[test]
    fn malformed_input_fails_without_partial_result() {
        let err = analyze(b"not a midi file at all").unwrap_err();
        assert!(!err.to_string().is_empty());
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn zero_tempo_file_is_processed_with_null_bpm() {
        let track = TrackBuilder::new()
            .tempo(0, 0)
            .note_on(0, 0, 60, 100)
            .note_off(480, 0, 60, 0)
            .finish();
        let result = analyze(&smf(480, &[track])).unwrap();
        assert_eq!(result.tempos, vec![f64::INFINITY]);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["tempos"], serde_json::json!([null]));
    }

    #[test]
    fn result_serializes_with_wire_field_names() {
        let track = TrackBuilder::new()
            .note_on(0, 0, 60, 100)
            .note_off(480, 0, 60, 0)
            .finish();
        let json = serde_json::to_value(analyze(&smf(480, &[track])).unwrap()).unwrap();
        let object = json.as_object().unwrap();
        for key in ["tempos", "keySignatures", "instruments", "structure", "sections"] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(json["structure"][1]["type"], "noteOff");
        assert_eq!(json["structure"][1]["deltaTime"], 480);
    }
}
