//! Event dispatcher
//!
//! A thread that listens to the scheduler and forwards each
//! [`PlaybackEvent`] to the selected output. Control messages arrive on a
//! separate channel and are multiplexed with `crossbeam_channel::select!`.

use crate::audio::midi::MidiOutputHandle;
use crate::audio::synth::SynthHandle;
use crate::config::OutputMode;
use colored::*;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use mml_core::types::PlaybackEvent;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Commands that can be sent to the dispatcher
pub enum DispatcherCommand {
    SetOutput(OutputMode),
    /// Provide the synth once an audio device has been opened
    AttachSynth(Arc<SynthHandle>),
    /// Drop queued events, release everything sounding on every output,
    /// then reply
    Silence(Sender<()>),
    Shutdown,
}

/// One line of console output for an event
pub fn format_event(event: &PlaybackEvent) -> String {
    match event {
        PlaybackEvent::NoteOn(note) => format!(
            "{:>6}ms  {}  {} track {} pitch {:>3} vol {:>3}",
            note.start_time,
            "on ".bright_green(),
            format!("{:<6}", note.clause.trim()).cyan(),
            note.track,
            note.pitch,
            note.volume
        ),
        PlaybackEvent::NoteOff(note) => format!(
            "{:>6}ms  {}  {} track {}",
            note.end_time(),
            "off".dimmed(),
            format!("{:<6}", note.clause.trim()).cyan(),
            note.track
        ),
        PlaybackEvent::End => format!("{}", "■ end".bright_blue().bold()),
    }
}

/// Counters shared between the dispatcher thread and its handle
#[derive(Debug, Default)]
pub struct DispatchStats {
    delivered: AtomicU64,
    sessions_finished: AtomicU64,
}

impl DispatchStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn sessions_finished(&self) -> u64 {
        self.sessions_finished.load(Ordering::Relaxed)
    }
}

/// Handle for sending commands to the dispatcher thread
pub struct DispatcherHandle {
    command_tx: Sender<DispatcherCommand>,
    thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
    stats: Arc<DispatchStats>,
}

impl DispatcherHandle {
    pub fn set_output(&self, output: OutputMode) {
        let _ = self.command_tx.send(DispatcherCommand::SetOutput(output));
    }

    pub fn attach_synth(&self, synth: Arc<SynthHandle>) {
        let _ = self.command_tx.send(DispatcherCommand::AttachSynth(synth));
    }

    /// Flush the dispatcher and release every held note.
    ///
    /// Blocks until the dispatcher has handled the request, so events
    /// already queued from a stopped session cannot sound afterwards.
    pub fn silence(&self) {
        let (done_tx, done_rx) = bounded(1);
        if self.command_tx.send(DispatcherCommand::Silence(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(DispatcherCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Routes scheduler events to outputs
pub struct EventDispatcher {
    output: OutputMode,
    midi: Arc<MidiOutputHandle>,
    synth: Option<Arc<SynthHandle>>,
    command_rx: Receiver<DispatcherCommand>,
    event_rx: Receiver<PlaybackEvent>,
    /// Receives a copy of every forwarded event
    tap: Option<Sender<PlaybackEvent>>,
    stats: Arc<DispatchStats>,
    is_running: Arc<AtomicBool>,
}

impl EventDispatcher {
    /// Start a dispatcher thread reading from `event_rx`
    pub fn spawn(
        event_rx: Receiver<PlaybackEvent>,
        midi: Arc<MidiOutputHandle>,
        output: OutputMode,
    ) -> DispatcherHandle {
        Self::spawn_with_tap(event_rx, midi, output, None)
    }

    /// Like [`spawn`](Self::spawn), also copying every event to `tap`
    pub fn spawn_with_tap(
        event_rx: Receiver<PlaybackEvent>,
        midi: Arc<MidiOutputHandle>,
        output: OutputMode,
        tap: Option<Sender<PlaybackEvent>>,
    ) -> DispatcherHandle {
        let (command_tx, command_rx) = unbounded();
        let is_running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(DispatchStats::default());

        let dispatcher = EventDispatcher {
            output,
            midi,
            synth: None,
            command_rx,
            event_rx,
            tap,
            stats: stats.clone(),
            is_running: is_running.clone(),
        };

        let thread = thread::spawn(move || dispatcher.run_loop());

        DispatcherHandle {
            command_tx,
            thread: Some(thread),
            is_running,
            stats,
        }
    }

    fn run_loop(mut self) {
        loop {
            crossbeam_channel::select! {
                recv(self.command_rx) -> msg => match msg {
                    Ok(cmd) => {
                        if !self.handle_command(cmd) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(self.event_rx) -> msg => match msg {
                    Ok(event) => self.dispatch(event),
                    Err(_) => break,
                },
            }
        }
        self.silence();
        self.is_running.store(false, Ordering::Relaxed);
    }

    /// Returns false when the loop should exit
    fn handle_command(&mut self, cmd: DispatcherCommand) -> bool {
        match cmd {
            DispatcherCommand::SetOutput(output) => {
                if output != self.output {
                    self.silence();
                    log::debug!("output switched from {} to {}", self.output, output);
                    self.output = output;
                }
            }
            DispatcherCommand::AttachSynth(synth) => {
                self.synth = Some(synth);
            }
            DispatcherCommand::Silence(done) => {
                self.drop_queued();
                self.silence();
                let _ = done.send(());
            }
            DispatcherCommand::Shutdown => return false,
        }
        true
    }

    fn dispatch(&mut self, event: PlaybackEvent) {
        match self.output {
            OutputMode::Console => println!("{}", format_event(&event)),
            OutputMode::Synth => match (&self.synth, &event) {
                (Some(synth), PlaybackEvent::NoteOn(note)) => synth.note_on(note),
                (Some(synth), PlaybackEvent::NoteOff(note)) => synth.note_off(note),
                (None, _) => log::trace!("no synth attached, dropping {}", event.kind()),
                _ => {}
            },
            OutputMode::Midi => {
                if let Err(e) = self.midi.handle_event(&event) {
                    log::warn!("MIDI output: {}", e);
                }
            }
        }

        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        if event == PlaybackEvent::End {
            self.stats.sessions_finished.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(tap) = &self.tap {
            let _ = tap.send(event);
        }
    }

    /// Discard events still waiting in the channel
    fn drop_queued(&self) {
        let stale = self.event_rx.try_iter().count();
        if stale > 0 {
            log::debug!("dropped {} queued events", stale);
        }
    }

    fn silence(&self) {
        if let Some(synth) = &self.synth {
            synth.release_all();
        }
        if let Err(e) = self.midi.release_active() {
            log::warn!("MIDI output: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mml_core::types::Note;
    use std::time::Duration;

    fn note() -> Note {
        Note {
            found_at: 3,
            clause: "d4 ".to_string(),
            track: 1,
            volume: 90,
            pitch: 62,
            start_time: 500,
            duration: 250,
        }
    }

    #[test]
    fn test_format_event() {
        colored::control::set_override(false);
        assert_eq!(
            format_event(&PlaybackEvent::NoteOn(note())),
            "   500ms  on   d4     track 1 pitch  62 vol  90"
        );
        assert_eq!(
            format_event(&PlaybackEvent::NoteOff(note())),
            "   750ms  off  d4     track 1"
        );
        assert_eq!(format_event(&PlaybackEvent::End), "■ end");
    }

    #[test]
    fn test_forwards_to_midi_and_tap() {
        let (event_tx, event_rx) = unbounded();
        let (tap_tx, tap_rx) = unbounded();
        let midi = Arc::new(MidiOutputHandle::new());
        let handle =
            EventDispatcher::spawn_with_tap(event_rx, midi.clone(), OutputMode::Midi, Some(tap_tx));

        event_tx.send(PlaybackEvent::NoteOn(note())).unwrap();
        let forwarded = tap_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(forwarded, PlaybackEvent::NoteOn(note()));
        assert_eq!(midi.active_count(), 1);

        event_tx.send(PlaybackEvent::End).unwrap();
        tap_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(handle.stats().delivered(), 2);
        assert_eq!(handle.stats().sessions_finished(), 1);
    }

    #[test]
    fn test_silence_drops_queued_events() {
        let (event_tx, event_rx) = unbounded();
        let (_command_tx, command_rx) = unbounded();
        let (tap_tx, tap_rx) = unbounded();
        let midi = Arc::new(MidiOutputHandle::new());
        let mut dispatcher = EventDispatcher {
            output: OutputMode::Midi,
            midi: midi.clone(),
            synth: None,
            command_rx,
            event_rx,
            tap: Some(tap_tx),
            stats: Arc::new(DispatchStats::default()),
            is_running: Arc::new(AtomicBool::new(true)),
        };

        dispatcher.dispatch(PlaybackEvent::NoteOn(note()));
        assert_eq!(midi.active_count(), 1);
        // Left over from a session that has since been stopped
        event_tx.send(PlaybackEvent::NoteOn(note())).unwrap();
        event_tx.send(PlaybackEvent::NoteOff(note())).unwrap();

        let (done_tx, done_rx) = bounded(1);
        assert!(dispatcher.handle_command(DispatcherCommand::Silence(done_tx)));
        done_rx.try_recv().unwrap();

        assert!(dispatcher.event_rx.is_empty());
        assert_eq!(midi.active_count(), 0);
        assert_eq!(tap_rx.try_iter().count(), 1);
        assert_eq!(dispatcher.stats.delivered(), 1);
    }

    #[test]
    fn test_silence_returns_after_dispatcher_exits() {
        let (event_tx, event_rx) = unbounded::<PlaybackEvent>();
        let handle = EventDispatcher::spawn(
            event_rx,
            Arc::new(MidiOutputHandle::new()),
            OutputMode::Console,
        );
        drop(event_tx);
        for _ in 0..100 {
            if !handle.is_running() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        handle.silence();
    }

    #[test]
    fn test_switching_output_silences_midi() {
        let (event_tx, event_rx) = unbounded();
        let (tap_tx, tap_rx) = unbounded();
        let midi = Arc::new(MidiOutputHandle::new());
        let handle =
            EventDispatcher::spawn_with_tap(event_rx, midi.clone(), OutputMode::Midi, Some(tap_tx));

        event_tx.send(PlaybackEvent::NoteOn(note())).unwrap();
        tap_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        handle.set_output(OutputMode::Synth);
        for _ in 0..100 {
            if midi.active_count() == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(midi.active_count(), 0);
    }

    #[test]
    fn test_stops_when_scheduler_goes_away() {
        let (event_tx, event_rx) = unbounded::<PlaybackEvent>();
        let handle = EventDispatcher::spawn(
            event_rx,
            Arc::new(MidiOutputHandle::new()),
            OutputMode::Console,
        );
        drop(event_tx);
        for _ in 0..100 {
            if !handle.is_running() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!handle.is_running());
    }
}
