//! Density/gap section segmentation.
//!
//! Streaming single pass over the note structure. A section closes when the
//! current event's raw delta exceeds the previous event's raw delta by more
//! than [`GAP_THRESHOLD_TICKS`], or when the note-on count passes
//! [`MAX_SECTION_NOTES`]. Deltas are compared directly, never accumulated.

use crate::event::NoteEvent;
use serde::{Deserialize, Serialize};

pub const GAP_THRESHOLD_TICKS: i64 = 1000;
pub const MAX_SECTION_NOTES: usize = 100;
pub const CHORUS_NOTE_THRESHOLD: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Verse,
    Chorus,
}

impl SectionKind {
    fn for_note_count(note_ons: usize) -> Self {
        if note_ons > CHORUS_NOTE_THRESHOLD {
            SectionKind::Chorus
        } else {
            SectionKind::Verse
        }
    }
}

/// A contiguous run of the note structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub events: Vec<NoteEvent>,
}

/// Partition `structure` into labeled sections.
///
/// Concatenating the returned sections' events reproduces `structure`.
pub fn segment(structure: &[NoteEvent]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Vec<NoteEvent> = Vec::new();
    let mut note_ons = 0usize;
    let mut last_delta: i64 = 0;

    for event in structure {
        if event.is_note_on() {
            note_ons += 1;
        }
        current.push(event.clone());

        let delta = event.delta_time as i64;
        if delta - last_delta > GAP_THRESHOLD_TICKS || note_ons > MAX_SECTION_NOTES {
            sections.push(Section {
                kind: SectionKind::for_note_count(note_ons),
                events: std::mem::take(&mut current),
            });
            note_ons = 0;
        }
        last_delta = delta;
    }

    if !current.is_empty() {
        sections.push(Section {
            kind: SectionKind::for_note_count(note_ons),
            events: current,
        });
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NoteKind;
    use pretty_assertions::assert_eq;

    fn note(kind: NoteKind, delta: u32) -> NoteEvent {
        NoteEvent {
            note_number: 60,
            velocity: 80,
            delta_time: delta,
            kind,
            channel: 0,
        }
    }

    fn on(delta: u32) -> NoteEvent {
        note(NoteKind::NoteOn, delta)
    }

    fn off(delta: u32) -> NoteEvent {
        note(NoteKind::NoteOff, delta)
    }

    fn concat(sections: &[Section]) -> Vec<NoteEvent> {
        sections.iter().flat_map(|s| s.events.clone()).collect()
    }

    #[test]
    fn empty_structure_has_no_sections() {
        assert!(segment(&[]).is_empty());
    }

    #[test]
    fn single_pair_is_one_verse() {
        let structure = vec![on(0), off(480)];
        let sections = segment(&structure);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::Verse);
        assert_eq!(sections[0].events, structure);
    }

    #[test]
    fn gap_compares_against_previous_raw_delta() {
        // 0 -> 1001 closes; 1001 -> 1500 does not (difference 499).
        let structure = vec![on(0), off(1001), on(1500), off(0)];
        let sections = segment(&structure);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].events, structure[..2].to_vec());
        assert_eq!(sections[1].events, structure[2..].to_vec());
    }

    #[test]
    fn gap_of_exactly_threshold_does_not_close() {
        let structure = vec![on(0), off(1000)];
        assert_eq!(segment(&structure).len(), 1);
    }

    #[test]
    fn first_event_gap_is_measured_from_zero() {
        let structure = vec![on(5000), off(0), on(900), off(10)];
        let sections = segment(&structure);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].events.len(), 1);
        assert_eq!(sections[1].events.len(), 3);
    }

    #[test]
    fn hundred_and_one_note_ons_close_a_chorus() {
        let mut structure: Vec<NoteEvent> = (0..101).map(|_| on(10)).collect();
        structure.push(off(10));
        structure.push(off(10));

        let sections = segment(&structure);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].kind, SectionKind::Chorus);
        assert_eq!(sections[0].events.len(), 101);
        assert_eq!(sections[1].kind, SectionKind::Verse);
        assert_eq!(sections[1].events.len(), 2);
    }

    #[test]
    fn exactly_hundred_note_ons_stay_open() {
        let structure: Vec<NoteEvent> = (0..100).map(|_| on(1)).collect();
        let sections = segment(&structure);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::Chorus);
    }

    #[test]
    fn label_boundary_is_more_than_fifty() {
        let fifty: Vec<NoteEvent> = (0..50).map(|_| on(1)).collect();
        assert_eq!(segment(&fifty)[0].kind, SectionKind::Verse);

        let fifty_one: Vec<NoteEvent> = (0..51).map(|_| on(1)).collect();
        assert_eq!(segment(&fifty_one)[0].kind, SectionKind::Chorus);
    }

    #[test]
    fn note_offs_do_not_count_toward_density() {
        let structure: Vec<NoteEvent> = (0..300).map(|_| off(1)).collect();
        let sections = segment(&structure);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::Verse);
    }

    #[test]
    fn sections_concatenate_back_to_structure() {
        let structure: Vec<NoteEvent> = (0..457u32)
            .map(|i| {
                let delta = (i * 379) % 2600;
                if i % 3 == 0 {
                    off(delta)
                } else {
                    on(delta)
                }
            })
            .collect();
        let sections = segment(&structure);
        assert!(sections.len() > 1);
        assert!(sections.iter().all(|s| !s.events.is_empty()));
        assert_eq!(concat(&sections), structure);
    }

    #[test]
    fn section_serializes_type_and_events() {
        let json = serde_json::to_value(segment(&[on(0)])).unwrap();
        assert_eq!(json[0]["type"], "verse");
        assert_eq!(json[0]["events"][0]["type"], "noteOn");
    }
}
