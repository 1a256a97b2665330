//! Property-based tests for cadenza-voices allocation.
//!
//! Drives every play mode with random event sequences and checks the
//! bookkeeping invariants: voice conservation, single ownership and
//! note-stack uniqueness. Mono and unison must also stay on their pinned
//! voices with a single key sounding.

use cadenza_core::{AudioBufferPool, Event};
use cadenza_voices::{PlayMode, SineVoice, VoiceManager};
use proptest::prelude::*;

const VOICES: usize = 6;

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        4 => (48u8..60, 1u8..128).prop_map(|(key, velocity)| Event::NoteOn { key, velocity }),
        4 => (48u8..60).prop_map(|key| Event::NoteOff { key }),
        1 => any::<bool>().prop_map(|on| Event::ControlChange {
            controller: 0x40,
            value: if on { 127 } else { 0 },
        }),
        1 => (0u16..16384).prop_map(|value| Event::PitchBend { value }),
    ]
}

fn play_mode() -> impl Strategy<Value = PlayMode> {
    prop_oneof![
        Just(PlayMode::Poly),
        Just(PlayMode::Mono),
        Just(PlayMode::Unison),
        Just(PlayMode::Interval),
    ]
}

fn pinned_mode() -> impl Strategy<Value = PlayMode> {
    prop_oneof![Just(PlayMode::Mono), Just(PlayMode::Unison)]
}

fn manager(mode: PlayMode, legato: bool) -> VoiceManager<SineVoice, VOICES> {
    let mut vm = VoiceManager::new(48000.0, AudioBufferPool::new(4, 64), |_| {
        SineVoice::new(48000.0)
    });
    vm.set_play_mode(mode);
    vm.set_legato(legato);
    vm
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Every voice is either free or held by exactly one note-stack entry.
    #[test]
    fn voice_conservation(
        mode in play_mode(),
        legato in any::<bool>(),
        events in prop::collection::vec(event(), 1..80),
    ) {
        let mut vm = manager(mode, legato);
        for event in events {
            vm.handle_event(event);

            let mut held: Vec<usize> = vm.note_stack().iter().filter_map(|e| e.voice).collect();
            held.sort_unstable();
            let before = held.len();
            held.dedup();
            prop_assert_eq!(before, held.len(), "voice held by two entries");
            prop_assert_eq!(held.len() + vm.free_voice_count(), VOICES);
        }
    }

    /// Mono and unison only sound their pinned voices, all for one key.
    #[test]
    fn pinned_modes_sound_one_key(
        mode in pinned_mode(),
        legato in any::<bool>(),
        events in prop::collection::vec(event(), 1..80),
    ) {
        let mut vm = manager(mode, legato);
        let pinned = vm.allocator().voices_per_note();
        for event in events {
            vm.handle_event(event);

            for (i, voice) in vm.voices().iter().enumerate() {
                prop_assert!(!voice.is_triggered() || i < pinned, "unpinned voice {} sounding", i);
            }
            let mut keys: Vec<i32> = vm
                .note_stack()
                .iter()
                .filter(|e| e.voice.is_some_and(|v| vm.voices()[v].is_triggered()))
                .map(|e| e.key)
                .collect();
            keys.dedup();
            prop_assert!(keys.len() <= 1, "keys sounding together: {:?}", keys);
        }
    }

    /// A key never has more entries than its strategy assigns per note.
    #[test]
    fn note_stack_uniqueness(
        mode in play_mode(),
        events in prop::collection::vec(event(), 1..80),
    ) {
        let mut vm = manager(mode, false);
        let per_note = vm.allocator().voices_per_note();
        for event in events {
            vm.handle_event(event);
            for entry in vm.note_stack() {
                let count = vm.note_stack().iter().filter(|e| e.key == entry.key).count();
                prop_assert!(count <= per_note, "key {} has {} entries", entry.key, count);
            }
        }
    }

    /// Without the pedal, releasing every key empties the stack and frees
    /// every voice.
    #[test]
    fn release_all_frees_everything(
        mode in play_mode(),
        keys in prop::collection::vec(48u8..60, 1..16),
    ) {
        let mut vm = manager(mode, false);
        for &key in &keys {
            vm.handle_event(Event::NoteOn { key, velocity: 100 });
        }
        for &key in &keys {
            vm.handle_event(Event::NoteOff { key });
        }
        prop_assert!(vm.note_stack().is_empty());
        prop_assert_eq!(vm.free_voice_count(), VOICES);
        prop_assert!(vm.voices().iter().all(|v| !v.is_triggered()));
    }

    /// Rendering stays finite for any event sequence.
    #[test]
    fn output_is_finite(
        mode in play_mode(),
        events in prop::collection::vec(event(), 1..40),
    ) {
        let mut vm = manager(mode, false);
        let mut block = [0.0f32; 64];
        for event in events {
            vm.handle_event(event);
            vm.render(&mut block);
            prop_assert!(block.iter().all(|s| s.is_finite()));
        }
    }
}
