//! End-to-end tests: control handle → engine → synth chain → output.

use std::time::Duration;

use cadenza_core::{Event, EventBlock, ProcessData};
use cadenza_io::{
    AudioBackend, AudioEngine, BackendStreamConfig, EngineOptions, MidiHandler, OfflineBackend,
    SynthChain, WavSpec, read_wav_stereo, write_wav,
};
use cadenza_voices::{PlayMode, SineVoice, VoiceManager};

const SR: f32 = 48000.0;

fn engine(options: &EngineOptions) -> (cadenza_io::AudioHandle, AudioEngine) {
    let (handle, mut engine) = AudioEngine::new(options);
    let voices: VoiceManager<SineVoice, 8> =
        VoiceManager::new(SR, engine.pool().clone(), |_| SineVoice::new(SR));
    engine
        .state_mut()
        .set_process_callback(SynthChain::new(voices, 1.0).into_callback());
    (handle, engine)
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

#[test]
fn silence_until_note_on() {
    let (mut handle, mut engine) = engine(&EngineOptions::default());
    let offline = OfflineBackend::new(256, 2);

    let quiet = offline.render(&mut engine, 2048);
    assert_eq!(peak(&quiet), 0.0);

    handle.enqueue(Event::NoteOn {
        key: 69,
        velocity: 100,
    });
    let loud = offline.render(&mut engine, 4800);
    assert!(peak(&loud) > 0.1);
    assert!(loud.iter().all(|s| s.is_finite()));
}

#[test]
fn note_off_decays_to_silence() {
    let (mut handle, mut engine) = engine(&EngineOptions::default());
    let offline = OfflineBackend::new(256, 2);

    handle.enqueue(Event::NoteOn {
        key: 60,
        velocity: 100,
    });
    offline.render(&mut engine, 4800);
    handle.enqueue(Event::NoteOff { key: 60 });
    // Release time constant is 0.18 s; silence is reached after ~1.7 s.
    offline.render(&mut engine, 144_000);
    let tail = offline.render(&mut engine, 1024);
    assert!(peak(&tail) < 1e-4);
}

#[test]
fn driver_size_does_not_change_output() {
    let render = |driver: usize| {
        let (mut handle, mut engine) = engine(&EngineOptions {
            block_size: 64,
            ..Default::default()
        });
        handle.enqueue(Event::NoteOn {
            key: 64,
            velocity: 90,
        });
        OfflineBackend::new(driver, 2).render(&mut engine, 3000)
    };

    let reference = render(64);
    for driver in [1, 37, 100, 512] {
        assert_eq!(render(driver), reference, "driver buffer {}", driver);
    }
}

#[test]
fn events_beyond_block_budget_wait_for_next_block() {
    let options = EngineOptions {
        block_size: 32,
        events_per_block: 2,
        ..Default::default()
    };
    let (mut handle, mut engine) = AudioEngine::new(&options);
    let pool = engine.pool().clone();
    let (tx, rx) = crossbeam_channel::unbounded();
    engine
        .state_mut()
        .set_process_callback(Box::new(move |data: ProcessData<0>| {
            for &event in data.events().iter() {
                let _ = tx.send(event);
            }
            data.with(pool.allocate_multi::<2>())
        }));

    for key in 0..6u8 {
        assert!(handle.enqueue(Event::NoteOn { key, velocity: 1 }));
    }
    let mut out = vec![0.0; 64];
    engine.process(&mut out, 2);
    assert_eq!(rx.try_iter().count(), 2);
    engine.process(&mut out, 2);
    engine.process(&mut out, 2);
    let rest: Vec<u8> = rx
        .try_iter()
        .map(|e| match e {
            Event::NoteOn { key, .. } => key,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(rest, vec![2, 3, 4, 5]);
}

#[test]
fn midi_handler_swapped_between_blocks() {
    struct Mute;
    impl MidiHandler for Mute {
        fn handle(&mut self, _event: Event, _out: &mut EventBlock) {}
    }

    let (mut handle, mut engine) = engine(&EngineOptions::default());
    let offline = OfflineBackend::new(256, 2);
    assert!(handle.set_midi_handler(Mute));
    offline.render(&mut engine, 256);

    handle.enqueue(Event::NoteOn {
        key: 69,
        velocity: 127,
    });
    let out = offline.render(&mut engine, 4800);
    assert_eq!(peak(&out), 0.0);
}

#[test]
fn process_callback_replaced_via_handle() {
    let (mut handle, mut engine) = engine(&EngineOptions::default());
    let offline = OfflineBackend::new(256, 2);

    let mut mono: VoiceManager<SineVoice, 8> =
        VoiceManager::new(SR, engine.pool().clone(), |_| SineVoice::new(SR));
    mono.set_play_mode(PlayMode::Mono);
    assert!(handle.set_process_callback(SynthChain::new(mono, 1.0).into_callback()));
    offline.render(&mut engine, 256);

    handle.enqueue(Event::NoteOn {
        key: 69,
        velocity: 127,
    });
    let out = offline.render(&mut engine, 4800);
    assert!(peak(&out) > 0.1);
    assert_eq!(engine.pool().in_use(), 0);
}

#[test]
fn wait_for_blocks_on_offline_stream() {
    let (handle, mut engine) = engine(&EngineOptions::default());
    let backend = OfflineBackend::default().paced(false);
    let stream = backend
        .build_output_stream(
            &BackendStreamConfig::default(),
            Box::new(move |buffer: &mut [f32]| engine.process(buffer, 2)),
            Box::new(|_: &str| {}),
        )
        .unwrap();

    assert!(handle.wait_for_blocks(8, Duration::from_secs(5)));
    assert!(handle.block_count() >= 8);
    drop(stream);
}

#[test]
fn rendered_phrase_round_trips_through_wav() {
    let (mut handle, mut engine) = engine(&EngineOptions::default());
    for key in [60, 64, 67] {
        handle.enqueue(Event::NoteOn { key, velocity: 100 });
    }
    let rendered = OfflineBackend::new(256, 2).render(&mut engine, 9600);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("phrase.wav");
    write_wav(&path, &rendered, WavSpec::default()).unwrap();

    let (left, right, spec) = read_wav_stereo(&path).unwrap();
    assert_eq!(spec.channels, 2);
    assert_eq!(left.len(), 9600);
    for (i, (l, r)) in left.iter().zip(&right).enumerate() {
        assert_eq!(*l, rendered[2 * i]);
        assert_eq!(*r, rendered[2 * i + 1]);
    }
}
