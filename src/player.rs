//! Playback session: timer, scheduler, dispatcher and outputs wired together

use crate::audio::event_dispatcher::{DispatcherHandle, EventDispatcher};
use crate::audio::midi::MidiOutputHandle;
use crate::audio::scheduler::{PlaybackSummary, Scheduler};
use crate::audio::synth::SynthHandle;
use crate::audio::timer::{DelayScheduler, ThreadTimer};
use crate::config::{OutputMode, PlayerConfig};
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Sender;
use mml_core::parser::{compile, render_diagnostic};
use mml_core::types::PlaybackEvent;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Everything needed to play MML text on the configured output
pub struct Player {
    config: Mutex<PlayerConfig>,
    // Declared before the dispatcher so the scheduler stops first on drop
    scheduler: Scheduler,
    dispatcher: DispatcherHandle,
    midi: Arc<MidiOutputHandle>,
    synth: Mutex<Option<Arc<SynthHandle>>>,
}

impl Player {
    /// Build a player on a wall-clock timer
    pub fn new(config: PlayerConfig) -> Result<Self> {
        Self::with_timer(config, Arc::new(ThreadTimer::new()), None)
    }

    /// Build a player on any timer, optionally copying dispatched events to `tap`
    pub fn with_timer(
        config: PlayerConfig,
        timer: Arc<dyn DelayScheduler>,
        tap: Option<Sender<PlaybackEvent>>,
    ) -> Result<Self> {
        let scheduler = Scheduler::new(timer);
        let midi = Arc::new(MidiOutputHandle::new());
        midi.set_channel_mode(config.channel_mode);

        let dispatcher =
            EventDispatcher::spawn_with_tap(scheduler.subscribe(), midi.clone(), config.output, tap);

        let player = Player {
            config: Mutex::new(config.clone()),
            scheduler,
            dispatcher,
            midi,
            synth: Mutex::new(None),
        };

        if let Some(port) = &config.midi_port {
            player.connect_midi(port)?;
        }
        if config.output != OutputMode::Console {
            player.set_output(config.output)?;
        }

        Ok(player)
    }

    pub fn config(&self) -> PlayerConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn midi(&self) -> &MidiOutputHandle {
        &self.midi
    }

    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }

    /// Compile and play `source`, replacing the current session.
    ///
    /// Compile errors are rendered against the source with a caret
    /// underline.
    pub fn play_source(&self, source: &str) -> Result<PlaybackSummary> {
        let notes = compile(source).map_err(|e| anyhow!("{}", render_diagnostic(source, &e)))?;
        // The old session must stop producing before the dispatcher flushes
        self.scheduler.stop();
        self.dispatcher.silence();
        Ok(self.scheduler.play_notes(notes))
    }

    pub fn play_file(&self, path: &Path) -> Result<PlaybackSummary> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.play_source(&source)
    }

    /// Stop playback and release anything still sounding
    pub fn stop(&self) -> bool {
        let was_playing = self.scheduler.stop();
        self.dispatcher.silence();
        was_playing
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    /// Switch outputs, opening the audio device or checking the MIDI
    /// connection as needed
    pub fn set_output(&self, output: OutputMode) -> Result<()> {
        match output {
            OutputMode::Synth => {
                let synth = self.ensure_synth()?;
                synth.set_volume(self.config().volume);
            }
            OutputMode::Midi if !self.midi.is_connected() => {
                return Err(anyhow!(
                    "No MIDI port connected. Use 'midi connect <port>' first"
                ));
            }
            _ => {}
        }

        self.dispatcher.set_output(output);
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .output = output;
        Ok(())
    }

    pub fn output(&self) -> OutputMode {
        self.config().output
    }

    pub fn set_volume(&self, volume: u8) {
        let volume = volume.min(100);
        if let Some(synth) = self.synth.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            synth.set_volume(volume);
        }
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .volume = volume;
    }

    pub fn volume(&self) -> u8 {
        self.config().volume
    }

    pub fn connect_midi(&self, port: &str) -> Result<String> {
        let name = self.midi.connect(port)?;
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .midi_port = Some(name.clone());
        Ok(name)
    }

    pub fn disconnect_midi(&self) -> Result<()> {
        self.midi.disconnect()?;
        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        config.midi_port = None;
        if config.output == OutputMode::Midi {
            config.output = OutputMode::Console;
            self.dispatcher.set_output(OutputMode::Console);
        }
        Ok(())
    }

    fn ensure_synth(&self) -> Result<Arc<SynthHandle>> {
        let mut slot = self.synth.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(synth) = slot.as_ref() {
            return Ok(synth.clone());
        }

        let synth = Arc::new(SynthHandle::new().context("Failed to open audio output")?);
        self.dispatcher.attach_synth(synth.clone());
        *slot = Some(synth.clone());
        Ok(synth)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::timer::VirtualTimer;

    fn player() -> (Arc<VirtualTimer>, Player) {
        let timer = Arc::new(VirtualTimer::new());
        let player = Player::with_timer(PlayerConfig::default(), timer.clone(), None).unwrap();
        (timer, player)
    }

    #[test]
    fn test_play_source_reports_diagnostic() {
        colored::control::set_override(false);
        let (_timer, player) = player();
        let err = player.play_source("c d\nc0").unwrap_err().to_string();
        assert!(err.contains("invalid length in clause 'c0' at character 4"));
        assert!(err.contains("line 2, column 1"));
        assert!(!player.is_playing());
    }

    #[test]
    fn test_play_and_stop() {
        let (timer, player) = player();
        let summary = player.play_source("t120 c d e").unwrap();
        assert_eq!(summary.length_ms, 1500);
        assert!(player.is_playing());

        timer.advance(std::time::Duration::from_millis(600));
        assert!(player.stop());
        assert!(!player.is_playing());
    }

    #[test]
    fn test_replacing_session_flushes_old_events() {
        let timer = Arc::new(VirtualTimer::new());
        let (tap_tx, tap_rx) = crossbeam_channel::unbounded();
        let player =
            Player::with_timer(PlayerConfig::default(), timer.clone(), Some(tap_tx)).unwrap();

        player.play_source("c1 d1 e1").unwrap();
        timer.advance(std::time::Duration::ZERO);
        player.play_source("t120 g").unwrap();
        // Whatever the dispatcher handled before the flush is history now
        let _ = tap_rx.try_iter().count();

        timer.run_all();
        let mut clauses = Vec::new();
        loop {
            let event = tap_rx
                .recv_timeout(std::time::Duration::from_secs(1))
                .unwrap();
            match event.note() {
                Some(note) => clauses.push(note.clause.trim().to_string()),
                None => break,
            }
        }
        assert_eq!(clauses, vec!["g", "g"]);
    }

    #[test]
    fn test_midi_output_requires_connection() {
        let (_timer, player) = player();
        assert!(player.set_output(OutputMode::Midi).is_err());
        assert_eq!(player.output(), OutputMode::Console);
    }

    #[test]
    fn test_volume_is_capped() {
        let (_timer, player) = player();
        player.set_volume(150);
        assert_eq!(player.volume(), 100);
    }

    #[test]
    fn test_missing_file() {
        let (_timer, player) = player();
        let err = player.play_file(Path::new("/nonexistent/score.mml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
