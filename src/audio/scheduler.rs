//! Event scheduler
//!
//! Turns a compiled note sequence into timed `note-on` / `note-off` / `end`
//! deliveries. Timing is delegated to a [`DelayScheduler`]; listeners receive
//! events over `crossbeam-channel` receivers obtained from
//! [`Scheduler::subscribe`].
//!
//! Every firing task checks the session generation and delivers while holding
//! the same lock [`Scheduler::stop`] takes, so once `stop` returns nothing from
//! the cancelled session reaches a listener.

use crate::audio::timer::{DelayScheduler, TimerId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use mml_core::parser::{compile, MmlError};
use mml_core::types::{end_time, Note, PlaybackEvent};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// What a call to [`Scheduler::play`] put on the timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub notes: usize,
    pub tracks: usize,
    /// Time of the end message, in milliseconds from the start of playback
    pub length_ms: u64,
}

impl PlaybackSummary {
    fn from_notes(notes: &[Note]) -> Self {
        let tracks: BTreeSet<usize> = notes.iter().map(|n| n.track).collect();
        PlaybackSummary {
            notes: notes.len(),
            tracks: tracks.len(),
            length_ms: end_time(notes),
        }
    }
}

/// One active playback
struct Session {
    generation: u64,
    /// Timer clock reading when playback started
    origin: Duration,
    timers: Vec<TimerId>,
    /// Notes switched on whose off has not been delivered yet
    sounding: usize,
    /// Notes whose on has not fired yet
    unplayed: usize,
    end_due: bool,
    summary: PlaybackSummary,
}

#[derive(Default)]
struct PlayState {
    generation: u64,
    session: Option<Session>,
}

impl PlayState {
    /// The session belonging to `generation`, if it is still the live one
    fn live(&mut self, generation: u64) -> Option<&mut Session> {
        self.session
            .as_mut()
            .filter(|session| session.generation == generation)
    }
}

struct Shared {
    timer: Arc<dyn DelayScheduler>,
    subscribers: Mutex<Vec<Sender<PlaybackEvent>>>,
    state: Mutex<PlayState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, PlayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send to every listener, forgetting the ones that hung up
    fn deliver(&self, event: PlaybackEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| match tx.send(event.clone()) {
            Ok(()) => true,
            Err(_) => {
                log::trace!("dropping closed listener");
                false
            }
        });
    }

    fn note_on(self: &Arc<Self>, generation: u64, note: Note) {
        let mut state = self.state();
        let Some(session) = state.live(generation) else {
            return;
        };

        session.unplayed -= 1;
        session.sounding += 1;
        let deadline = session
            .origin
            .saturating_add(Duration::from_millis(note.end_time()));

        let weak = Arc::downgrade(self);
        let off_note = note.clone();
        let id = self.timer.schedule_at(
            deadline,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.note_off(generation, off_note);
                }
            }),
        );
        session.timers.push(id);

        self.deliver(PlaybackEvent::NoteOn(note));
    }

    fn note_off(&self, generation: u64, note: Note) {
        let mut state = self.state();
        let Some(session) = state.live(generation) else {
            return;
        };

        session.sounding -= 1;
        let finished = session.end_due && session.sounding == 0 && session.unplayed == 0;
        self.deliver(PlaybackEvent::NoteOff(note));

        if finished {
            self.finish(&mut state);
        }
    }

    fn end(&self, generation: u64) {
        let mut state = self.state();
        let Some(session) = state.live(generation) else {
            return;
        };

        session.end_due = true;
        // Offs falling due at the same instant still go out before the end
        if session.sounding == 0 && session.unplayed == 0 {
            self.finish(&mut state);
        }
    }

    fn finish(&self, state: &mut PlayState) {
        if let Some(session) = state.session.take() {
            log::debug!(
                "session {} finished after {} ms",
                session.generation,
                session.summary.length_ms
            );
        }
        self.deliver(PlaybackEvent::End);
    }

    /// Invalidate the live session and cancel its timers
    fn cancel(&self, state: &mut PlayState) -> bool {
        state.generation += 1;
        match state.session.take() {
            Some(session) => {
                for id in session.timers {
                    self.timer.cancel(id);
                }
                log::debug!("session {} stopped", session.generation);
                true
            }
            None => false,
        }
    }
}

/// Plays compiled notes on a single timeline
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    pub fn new(timer: Arc<dyn DelayScheduler>) -> Self {
        Scheduler {
            shared: Arc::new(Shared {
                timer,
                subscribers: Mutex::new(Vec::new()),
                state: Mutex::new(PlayState::default()),
            }),
        }
    }

    /// Register a listener; it receives every event delivered from now on
    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = unbounded();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Compile `text` and start playing it, replacing any active session.
    ///
    /// A compile error leaves the current session untouched.
    pub fn play(&self, text: &str) -> Result<PlaybackSummary, MmlError> {
        let notes = compile(text)?;
        Ok(self.play_notes(notes))
    }

    /// Start playing already compiled notes. Returns without waiting.
    pub fn play_notes(&self, notes: Vec<Note>) -> PlaybackSummary {
        let shared = &self.shared;
        let mut state = shared.state();
        shared.cancel(&mut state);

        let generation = state.generation;
        let origin = shared.timer.now();
        let summary = PlaybackSummary::from_notes(&notes);
        let mut timers = Vec::with_capacity(notes.len() + 1);

        log::debug!(
            "session {}: {} notes on {} tracks, {} ms",
            generation,
            summary.notes,
            summary.tracks,
            summary.length_ms
        );

        for note in notes {
            let deadline = origin.saturating_add(Duration::from_millis(note.start_time));
            let weak: Weak<Shared> = Arc::downgrade(shared);
            timers.push(shared.timer.schedule_at(
                deadline,
                Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.note_on(generation, note);
                    }
                }),
            ));
        }

        let weak = Arc::downgrade(shared);
        timers.push(shared.timer.schedule_at(
            origin.saturating_add(Duration::from_millis(summary.length_ms)),
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.end(generation);
                }
            }),
        ));

        state.session = Some(Session {
            generation,
            origin,
            timers,
            sounding: 0,
            unplayed: summary.notes,
            end_due: false,
            summary: summary.clone(),
        });

        summary
    }

    /// Cancel everything pending. Returns whether a session was active.
    pub fn stop(&self) -> bool {
        let mut state = self.shared.state();
        self.shared.cancel(&mut state)
    }

    pub fn is_playing(&self) -> bool {
        self.shared.state().session.is_some()
    }

    /// Summary of the active session
    pub fn current(&self) -> Option<PlaybackSummary> {
        self.shared
            .state()
            .session
            .as_ref()
            .map(|session| session.summary.clone())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
