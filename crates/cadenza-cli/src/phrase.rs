//! The built-in demo phrase.
//!
//! A chord held through the sustain pedal, a pitch bend over the sustained
//! chord, then a single note after the pedal lifts. Exercises allocation,
//! sustain release and pitch bend in every play mode.

use cadenza_core::Event;

const CC_SUSTAIN: u8 = 64;

const CHORD: [u8; 4] = [48, 55, 60, 64];

/// One event at a time offset in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cue {
    pub at: f32,
    pub event: Event,
}

const fn cue(at: f32, event: Event) -> Cue {
    Cue { at, event }
}

/// Phrase length in seconds, excluding the release tail.
pub const LENGTH_SECS: f32 = 4.0;

/// The phrase, ordered by time.
pub fn cues() -> Vec<Cue> {
    let mut cues = Vec::with_capacity(16);
    for key in CHORD {
        cues.push(cue(0.0, Event::NoteOn { key, velocity: 100 }));
    }
    cues.push(cue(
        0.5,
        Event::ControlChange {
            controller: CC_SUSTAIN,
            value: 127,
        },
    ));
    for key in CHORD {
        cues.push(cue(0.8, Event::NoteOff { key }));
    }
    cues.push(cue(1.5, Event::PitchBend { value: 12288 }));
    cues.push(cue(2.0, Event::PitchBend { value: 8192 }));
    cues.push(cue(
        2.5,
        Event::ControlChange {
            controller: CC_SUSTAIN,
            value: 0,
        },
    ));
    cues.push(cue(
        2.6,
        Event::NoteOn {
            key: 67,
            velocity: 90,
        },
    ));
    cues.push(cue(3.4, Event::NoteOff { key: 67 }));
    cues
}

/// Converts a cue time to a frame index.
pub fn frame_of(at: f32, sample_rate: u32) -> usize {
    (at * sample_rate as f32).round() as usize
}
