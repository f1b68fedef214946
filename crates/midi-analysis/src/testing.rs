//! Standard MIDI File byte builder for synthesizing test fixtures.

/// Builds one MTrk body event by event. Deltas are written as VLQ.
#[derive(Debug, Default, Clone)]
pub struct TrackBuilder {
    data: Vec<u8>,
}

impl TrackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_on(mut self, delta: u32, channel: u8, key: u8, vel: u8) -> Self {
        self.event(delta, &[0x90 | (channel & 0x0F), key, vel]);
        self
    }

    pub fn note_off(mut self, delta: u32, channel: u8, key: u8, vel: u8) -> Self {
        self.event(delta, &[0x80 | (channel & 0x0F), key, vel]);
        self
    }

    pub fn program_change(mut self, delta: u32, channel: u8, program: u8) -> Self {
        self.event(delta, &[0xC0 | (channel & 0x0F), program]);
        self
    }

    pub fn control_change(mut self, delta: u32, channel: u8, controller: u8, value: u8) -> Self {
        self.event(delta, &[0xB0 | (channel & 0x0F), controller, value]);
        self
    }

    pub fn tempo(mut self, delta: u32, usec_per_beat: u32) -> Self {
        self.event(
            delta,
            &[
                0xFF,
                0x51,
                0x03,
                (usec_per_beat >> 16) as u8,
                (usec_per_beat >> 8) as u8,
                usec_per_beat as u8,
            ],
        );
        self
    }

    pub fn key_signature(mut self, delta: u32, sharps: i8, minor: bool) -> Self {
        self.event(delta, &[0xFF, 0x59, 0x02, sharps as u8, minor as u8]);
        self
    }

    pub fn track_name(mut self, delta: u32, name: &str) -> Self {
        let mut data = vec![0xFF, 0x03];
        write_vlq(&mut data, name.len() as u32);
        data.extend_from_slice(name.as_bytes());
        self.event(delta, &data);
        self
    }

    /// Appends end-of-track and returns the chunk body.
    pub fn finish(mut self) -> Vec<u8> {
        self.event(0, &[0xFF, 0x2F, 0x00]);
        self.data
    }

    fn event(&mut self, delta: u32, bytes: &[u8]) {
        write_vlq(&mut self.data, delta);
        self.data.extend_from_slice(bytes);
    }
}

/// Assemble a format-1 file from finished track bodies.
pub fn smf(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    for track_data in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(track_data);
    }

    buf
}

/// Write a variable-length quantity to a byte buffer.
pub fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    if value == 0 {
        buf.push(0);
        return;
    }

    let mut bytes = Vec::new();
    bytes.push((value & 0x7F) as u8);
    value >>= 7;

    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    buf.extend_from_slice(&bytes);
}
