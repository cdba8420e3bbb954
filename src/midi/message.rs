use std::fmt;

/// One MIDI message as delivered by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off message with note number and release velocity
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Note On message with note number and velocity
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Polyphonic key pressure
    PolyPressure { channel: u8, note: u8, pressure: u8 },
    /// Control Change message with controller number and value
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    /// Program Change message with program number
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    /// Pitch bend, 14-bit value centred on 0x2000
    PitchBend { channel: u8, value: u16 },
    /// System exclusive payload without the F0/F7 framing
    SysEx(Vec<u8>),
    Clock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    Reset,
    /// Any message not covered above, or a truncated channel message
    Other(Vec<u8>),
}

impl MidiMessage {
    /// Classifies raw bytes. Only an empty slice yields `None`.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;
        let channel = status & 0x0F;

        let message = match (status & 0xF0, data.len()) {
            (0x80, 3..) => MidiMessage::NoteOff {
                channel,
                note: data[1],
                velocity: data[2],
            },
            (0x90, 3..) => MidiMessage::NoteOn {
                channel,
                note: data[1],
                velocity: data[2],
            },
            (0xA0, 3..) => MidiMessage::PolyPressure {
                channel,
                note: data[1],
                pressure: data[2],
            },
            (0xB0, 3..) => MidiMessage::ControlChange {
                channel,
                controller: data[1],
                value: data[2],
            },
            (0xC0, 2..) => MidiMessage::ProgramChange {
                channel,
                program: data[1],
            },
            (0xD0, 2..) => MidiMessage::ChannelPressure {
                channel,
                pressure: data[1],
            },
            (0xE0, 3..) => MidiMessage::PitchBend {
                channel,
                value: (u16::from(data[2] & 0x7F) << 7) | u16::from(data[1] & 0x7F),
            },
            _ => match status {
                0xF0 => {
                    let payload = match data.last() {
                        Some(0xF7) if data.len() > 1 => &data[1..data.len() - 1],
                        _ => &data[1..],
                    };
                    MidiMessage::SysEx(payload.to_vec())
                }
                0xF8 => MidiMessage::Clock,
                0xFA => MidiMessage::Start,
                0xFB => MidiMessage::Continue,
                0xFC => MidiMessage::Stop,
                0xFE => MidiMessage::ActiveSensing,
                0xFF => MidiMessage::Reset,
                _ => MidiMessage::Other(data.to_vec()),
            },
        };

        Some(message)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => vec![0x80 | (channel & 0x0F), *note, *velocity],
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => vec![0x90 | (channel & 0x0F), *note, *velocity],
            MidiMessage::PolyPressure {
                channel,
                note,
                pressure,
            } => vec![0xA0 | (channel & 0x0F), *note, *pressure],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => vec![0xB0 | (channel & 0x0F), *controller, *value],
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), *program]
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                vec![0xD0 | (channel & 0x0F), *pressure]
            }
            MidiMessage::PitchBend { channel, value } => vec![
                0xE0 | (channel & 0x0F),
                (value & 0x7F) as u8,
                ((value >> 7) & 0x7F) as u8,
            ],
            MidiMessage::SysEx(payload) => {
                let mut bytes = Vec::with_capacity(payload.len() + 2);
                bytes.push(0xF0);
                bytes.extend_from_slice(payload);
                bytes.push(0xF7);
                bytes
            }
            MidiMessage::Clock => vec![0xF8],
            MidiMessage::Start => vec![0xFA],
            MidiMessage::Continue => vec![0xFB],
            MidiMessage::Stop => vec![0xFC],
            MidiMessage::ActiveSensing => vec![0xFE],
            MidiMessage::Reset => vec![0xFF],
            MidiMessage::Other(bytes) => bytes.clone(),
        }
    }

    /// Zero-based channel for channel voice messages
    pub fn channel(&self) -> Option<u8> {
        match self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::PolyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => write!(f, "note-off ch={} note={} vel={}", channel, note, velocity),
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => write!(f, "note-on ch={} note={} vel={}", channel, note, velocity),
            MidiMessage::PolyPressure {
                channel,
                note,
                pressure,
            } => write!(f, "poly-pressure ch={} note={} value={}", channel, note, pressure),
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => write!(f, "cc ch={} cc={} value={}", channel, controller, value),
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "program ch={} program={}", channel, program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                write!(f, "pressure ch={} value={}", channel, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "pitch-bend ch={} value={}", channel, value)
            }
            MidiMessage::SysEx(payload) => write!(f, "sysex {} bytes", payload.len()),
            MidiMessage::Clock => write!(f, "clock"),
            MidiMessage::Start => write!(f, "start"),
            MidiMessage::Continue => write!(f, "continue"),
            MidiMessage::Stop => write!(f, "stop"),
            MidiMessage::ActiveSensing => write!(f, "active-sensing"),
            MidiMessage::Reset => write!(f, "reset"),
            MidiMessage::Other(bytes) => write!(f, "raw {:02X?}", bytes),
        }
    }
}
