//! Default process chain: voices into the master stage.

use cadenza_core::{Event, ProcessData};
use cadenza_voices::{MixHooks, SynthVoice, VoiceManager};

use crate::engine::ProcessCallback;
use crate::master::Master;

/// MIDI channel volume controller, routed to the master stage.
const CC_VOLUME: u8 = 7;

/// Voice manager → mono-to-stereo fan-out → [`Master`].
///
/// The mono voice bus is bound to both output channels as two handles to
/// the same buffer; the master stage copies on its first write.
pub struct SynthChain<V, const N: usize, H = ()> {
    voices: VoiceManager<V, N, H>,
    master: Master,
}

impl<V: SynthVoice, const N: usize, H: MixHooks> SynthChain<V, N, H> {
    /// Creates a chain with the master stage at `volume`.
    pub fn new(voices: VoiceManager<V, N, H>, volume: f32) -> Self {
        Self {
            voices,
            master: Master::new(volume),
        }
    }

    /// Runs one block.
    pub fn process(&mut self, data: ProcessData<0>) -> ProcessData<2> {
        for event in data.events().iter() {
            if let Event::ControlChange {
                controller: CC_VOLUME,
                value,
            } = *event
            {
                self.master.set_volume(f32::from(value) / 127.0);
            }
        }

        let mono = self.voices.process(data);
        let bus = mono.buffer().clone();
        let stereo = mono.with([bus.clone(), bus]);
        self.master.process(stereo)
    }

    /// The voice manager.
    pub fn voices(&self) -> &VoiceManager<V, N, H> {
        &self.voices
    }

    /// Mutable access to the voice manager.
    pub fn voices_mut(&mut self) -> &mut VoiceManager<V, N, H> {
        &mut self.voices
    }

    /// The master stage.
    pub fn master(&self) -> &Master {
        &self.master
    }

    /// Mutable access to the master stage.
    pub fn master_mut(&mut self) -> &mut Master {
        &mut self.master
    }
}

impl<V, const N: usize, H> SynthChain<V, N, H>
where
    V: SynthVoice + Send + 'static,
    H: MixHooks + Send + 'static,
{
    /// Boxes the chain as the engine's process callback.
    pub fn into_callback(mut self) -> ProcessCallback {
        Box::new(move |data| self.process(data))
    }
}
