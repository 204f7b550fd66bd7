//! FM synth output
//!
//! Each note becomes a sine carrier whose frequency is modulated by a second
//! sine at three times the carrier frequency, shaped by an [`AdsrEnvelope`].
//! The `cpal` stream lives on its own thread (streams are not `Send`); voices
//! live in a shared [`SynthState`] that the audio callback renders.

use crate::audio::adsr::{AdsrEnvelope, AdsrParams};
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use mml_core::types::{pitch_to_frequency, Note};
use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Modulator frequency relative to the carrier
pub const MODULATOR_RATIO: f32 = 3.0;

/// Peak frequency deviation relative to the carrier
pub const MODULATION_DEPTH: f32 = 0.2;

/// Gain applied before any volume command
pub const DEFAULT_MASTER_GAIN: f32 = 0.05;

/// Carrier frequency for a pitch, truncated to whole hertz
pub fn voice_frequency(pitch: i32) -> f32 {
    pitch_to_frequency(pitch).floor()
}

/// Master gain for a volume percentage (0-100)
pub fn master_gain(volume_percent: u8) -> f32 {
    0.1 * volume_percent.min(100) as f32 / 100.0
}

/// One sounding note
#[derive(Debug, Clone)]
struct Voice {
    frequency: f32,
    carrier_phase: f32,
    modulator_phase: f32,
    envelope: AdsrEnvelope,
}

impl Voice {
    fn new(note: &Note, params: AdsrParams, sample_rate: f32) -> Self {
        let mut envelope = AdsrEnvelope::new(params, sample_rate, note.level());
        envelope.trigger();
        Voice {
            frequency: voice_frequency(note.pitch),
            carrier_phase: 0.0,
            modulator_phase: 0.0,
            envelope,
        }
    }

    fn next_sample(&mut self, sample_rate: f32) -> f32 {
        let modulator = self.modulator_phase.sin();
        let instantaneous = self.frequency * (1.0 + MODULATION_DEPTH * modulator);
        let value = self.carrier_phase.sin() * self.envelope.next_sample();

        self.carrier_phase = (self.carrier_phase + TAU * instantaneous / sample_rate) % TAU;
        self.modulator_phase =
            (self.modulator_phase + TAU * self.frequency * MODULATOR_RATIO / sample_rate) % TAU;
        value
    }
}

/// Voices and gain shared between the dispatcher and the audio callback
#[derive(Debug)]
pub struct SynthState {
    sample_rate: f32,
    gain: f32,
    params: AdsrParams,
    /// Held notes keyed by [`Note::id`]
    held: HashMap<(usize, usize), Voice>,
    /// Voices in their release tail
    releasing: Vec<Voice>,
}

impl SynthState {
    pub fn new(sample_rate: f32) -> Self {
        SynthState {
            sample_rate,
            gain: DEFAULT_MASTER_GAIN,
            params: AdsrParams::default(),
            held: HashMap::new(),
            releasing: Vec::new(),
        }
    }

    pub fn note_on(&mut self, note: &Note) {
        let voice = Voice::new(note, self.params, self.sample_rate);
        if !voice.frequency.is_finite() {
            log::debug!("pitch {} has no audible frequency, skipped", note.pitch);
            return;
        }
        if let Some(mut previous) = self.held.insert(note.id(), voice) {
            previous.envelope.release();
            self.releasing.push(previous);
        }
    }

    pub fn note_off(&mut self, note: &Note) {
        if let Some(mut voice) = self.held.remove(&note.id()) {
            voice.envelope.release();
            self.releasing.push(voice);
        }
    }

    /// Release every held voice
    pub fn release_all(&mut self) {
        for (_, mut voice) in self.held.drain() {
            voice.envelope.release();
            self.releasing.push(voice);
        }
    }

    pub fn set_volume(&mut self, volume_percent: u8) {
        self.gain = master_gain(volume_percent);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Number of voices still producing sound
    pub fn active_voices(&self) -> usize {
        self.held.len() + self.releasing.len()
    }

    /// Render one mono sample
    pub fn next_sample(&mut self) -> f32 {
        let sample_rate = self.sample_rate;
        let mut sum = 0.0;
        for voice in self.held.values_mut() {
            sum += voice.next_sample(sample_rate);
        }
        for voice in self.releasing.iter_mut() {
            sum += voice.next_sample(sample_rate);
        }
        self.releasing.retain(|voice| !voice.envelope.is_finished());
        (sum * self.gain).clamp(-1.0, 1.0)
    }
}

/// Handle to the FM synth. Dropping it closes the audio stream.
pub struct SynthHandle {
    state: Arc<Mutex<SynthState>>,
    shutdown_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SynthHandle {
    /// Open the default output device and start the stream
    pub fn new() -> Result<Self> {
        let (ready_tx, ready_rx) = bounded::<Result<Arc<Mutex<SynthState>>>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let thread = thread::spawn(move || {
            let stream = match open_stream() {
                Ok((stream, state)) => {
                    let _ = ready_tx.send(Ok(state));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            // Keep the stream alive until shutdown
            let _ = shutdown_rx.recv();
            drop(stream);
        });

        let state = ready_rx
            .recv()
            .map_err(|_| anyhow!("Audio thread exited during setup"))??;

        Ok(SynthHandle {
            state,
            shutdown_tx,
            thread: Some(thread),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SynthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn note_on(&self, note: &Note) {
        self.state().note_on(note);
    }

    pub fn note_off(&self, note: &Note) {
        self.state().note_off(note);
    }

    pub fn release_all(&self) {
        self.state().release_all();
    }

    pub fn set_volume(&self, volume_percent: u8) {
        self.state().set_volume(volume_percent);
    }
}

impl Drop for SynthHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn open_stream() -> Result<(Stream, Arc<Mutex<SynthState>>)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No output device available"))?;
    let config = device.default_output_config()?;

    let sample_format = config.sample_format();
    let config: StreamConfig = config.into();
    let state = Arc::new(Mutex::new(SynthState::new(config.sample_rate.0 as f32)));

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, state.clone())?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, state.clone())?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, state.clone())?,
        _ => return Err(anyhow!("Unsupported sample format: {:?}", sample_format)),
    };
    stream
        .play()
        .map_err(|e| anyhow!("Failed to play stream: {}", e))?;

    log::debug!(
        "synth stream open at {} Hz, {} channels",
        config.sample_rate.0,
        config.channels
    );
    Ok((stream, state))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    state: Arc<Mutex<SynthState>>,
) -> Result<Stream>
where
    T: Sample + SizedSample + Send + 'static + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let err_fn = |err| log::error!("an error occurred on the output audio stream: {:?}", err);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                for frame in data.chunks_mut(channels) {
                    let value: T = cpal::Sample::from_sample(state.next_sample());
                    for sample in frame.iter_mut() {
                        *sample = value;
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| anyhow!("Failed to build output stream: {}", e))
}
