//! Standard MIDI File decoding.
//!
//! Chunk framing is checked first so that malformed containers fail with a
//! precise message; event parsing is delegated to `midly` in strict mode, so a corrupt
//! event inside a track is an error rather than the end of the track. Decoding is
//! all-or-nothing: any error discards every track.

use crate::event::{EventKind, MidiEvent, MidiFile, Timing, Track};
use crate::{Error, Result};
use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};

const HEADER_ID: &[u8; 4] = b"MThd";
const TRACK_ID: &[u8; 4] = b"MTrk";
const CHUNK_PREAMBLE: usize = 8;
const MIN_HEADER_LEN: usize = 6;

/// Decode a byte buffer into its tracks.
pub fn decode(bytes: &[u8]) -> Result<Vec<Track>> {
    decode_file(bytes).map(|file| file.tracks)
}

/// Decode a byte buffer, keeping header format and timing.
pub fn decode_file(bytes: &[u8]) -> Result<MidiFile> {
    check_framing(bytes)?;

    let smf = Smf::parse(bytes).map_err(|e| Error::Decode(e.to_string()))?;

    let format = match smf.header.format {
        midly::Format::SingleTrack => 0,
        midly::Format::Parallel => 1,
        midly::Format::Sequential => 2,
    };

    let timing = match smf.header.timing {
        midly::Timing::Metrical(ticks) => Timing::Metrical(ticks.as_int()),
        midly::Timing::Timecode(fps, ticks_per_frame) => Timing::Timecode {
            fps: fps.as_int(),
            ticks_per_frame,
        },
    };

    let tracks = smf
        .tracks
        .iter()
        .map(|track| track.iter().map(convert_event).collect())
        .collect();

    Ok(MidiFile {
        format,
        timing,
        tracks,
    })
}

fn convert_event(event: &midly::TrackEvent<'_>) -> MidiEvent {
    let kind = match event.kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match message {
                // Running-status note-off idiom: NoteOn with zero velocity.
                MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => EventKind::NoteOff {
                    channel,
                    note_number: key.as_int(),
                    velocity: 0,
                },
                MidiMessage::NoteOn { key, vel } => EventKind::NoteOn {
                    channel,
                    note_number: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOff { key, vel } => EventKind::NoteOff {
                    channel,
                    note_number: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::ProgramChange { program } => EventKind::ProgramChange {
                    channel,
                    program_number: program.as_int(),
                },
                _ => EventKind::Other,
            }
        }
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => EventKind::SetTempo {
            microseconds_per_beat: tempo.as_int(),
        },
        TrackEventKind::Meta(MetaMessage::KeySignature(key, minor)) => EventKind::KeySignature {
            key,
            scale: u8::from(minor),
        },
        _ => EventKind::Other,
    };

    MidiEvent::new(event.delta.as_int(), kind)
}

/// Walk the chunk list: one `MThd`, then only `MTrk` chunks, all in bounds.
fn check_framing(bytes: &[u8]) -> Result<()> {
    if bytes.len() < CHUNK_PREAMBLE + MIN_HEADER_LEN {
        return Err(Error::Decode(format!(
            "bad header: {} bytes is too short for a MIDI file",
            bytes.len()
        )));
    }

    if &bytes[0..4] != HEADER_ID {
        return Err(Error::Decode(format!(
            "bad header: expected MThd, got {}",
            printable_id(&bytes[0..4])
        )));
    }

    let header_len = chunk_len(bytes, 0);
    if header_len < MIN_HEADER_LEN {
        return Err(Error::Decode(format!(
            "bad header: header chunk length {} is shorter than {}",
            header_len, MIN_HEADER_LEN
        )));
    }

    let mut offset = CHUNK_PREAMBLE + header_len;
    if offset > bytes.len() {
        return Err(Error::Decode(format!(
            "truncated chunk: header chunk claims {} bytes, {} available",
            header_len,
            bytes.len() - CHUNK_PREAMBLE
        )));
    }

    while offset < bytes.len() {
        let remaining = bytes.len() - offset;
        if remaining < CHUNK_PREAMBLE {
            return Err(Error::Decode(format!(
                "truncated chunk at offset {}: {} trailing bytes",
                offset, remaining
            )));
        }

        let id = &bytes[offset..offset + 4];
        if id != TRACK_ID {
            return Err(Error::Decode(format!(
                "unsupported chunk type {} at offset {}",
                printable_id(id),
                offset
            )));
        }

        let len = chunk_len(bytes, offset);
        let end = offset + CHUNK_PREAMBLE + len;
        if end > bytes.len() {
            return Err(Error::Decode(format!(
                "truncated chunk at offset {}: claims {} bytes, {} available",
                offset,
                len,
                remaining - CHUNK_PREAMBLE
            )));
        }

        offset = end;
    }

    Ok(())
}

/// Big-endian chunk length of the chunk starting at `offset`. Caller checks bounds.
fn chunk_len(bytes: &[u8], offset: usize) -> usize {
    let len = [
        bytes[offset + 4],
        bytes[offset + 5],
        bytes[offset + 6],
        bytes[offset + 7],
    ];
    u32::from_be_bytes(len) as usize
}

fn printable_id(id: &[u8]) -> String {
    format!("{:?}", String::from_utf8_lossy(id))
}
