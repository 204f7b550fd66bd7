//! MIDI output
//!
//! Thread-safe MIDI output using midir. The connection lives on its own
//! thread; [`MidiOutputHandle`] sends it commands over a channel.

use anyhow::{anyhow, Result};
use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use mml_core::types::{Note, PlaybackEvent};
use std::collections::HashSet;
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

const CLIENT_NAME: &str = "mml-player";

/// How tracks map to MIDI channels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MidiChannelMode {
    /// Track 0 → channel 1, track 1 → channel 2, wrapping after 16
    #[default]
    PerTrack,
    /// Every track on one channel (0-15)
    Mono(u8),
}

impl fmt::Display for MidiChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiChannelMode::PerTrack => write!(f, "per-track"),
            MidiChannelMode::Mono(ch) => write!(f, "mono (channel {})", ch + 1),
        }
    }
}

/// Commands that can be sent to the MIDI output thread
#[derive(Debug)]
enum MidiCommand {
    Connect {
        port_name: String,
        reply: Sender<Result<String>>,
    },
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8 },
    AllNotesOff { channel: u8 },
    Disconnect,
    Shutdown,
}

/// Find a port whose name contains `port_name`
fn find_port(midi_out: &MidiOutput, port_name: &str) -> Result<(MidiOutputPort, String)> {
    midi_out
        .ports()
        .into_iter()
        .find_map(|port| {
            let name = midi_out.port_name(&port).ok()?;
            name.contains(port_name).then_some((port, name))
        })
        .ok_or_else(|| anyhow!("MIDI port '{}' not found", port_name))
}

/// Owns the connection
struct MidiOutputInternal {
    connection: Option<MidiOutputConnection>,
    command_rx: Receiver<MidiCommand>,
}

impl MidiOutputInternal {
    fn new(command_rx: Receiver<MidiCommand>) -> Self {
        Self {
            connection: None,
            command_rx,
        }
    }

    fn connect(&mut self, port_name: &str) -> Result<String> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let (port, name) = find_port(&midi_out, port_name)?;
        let connection = midi_out
            .connect(&port, "mml-player-out")
            .map_err(|e| anyhow!("Failed to connect to '{}': {}", name, e))?;
        self.connection = Some(connection);
        Ok(name)
    }

    fn send(&mut self, message: &[u8]) {
        if let Some(conn) = &mut self.connection {
            if let Err(e) = conn.send(message) {
                log::warn!("MIDI send failed: {}", e);
            }
        }
    }

    fn run(&mut self) {
        while let Ok(cmd) = self.command_rx.recv() {
            match cmd {
                MidiCommand::Connect { port_name, reply } => {
                    let _ = reply.send(self.connect(&port_name));
                }
                MidiCommand::NoteOn {
                    channel,
                    key,
                    velocity,
                } => self.send(&[0x90 | (channel & 0x0F), key & 0x7F, velocity & 0x7F]),
                MidiCommand::NoteOff { channel, key } => {
                    self.send(&[0x80 | (channel & 0x0F), key & 0x7F, 0])
                }
                // All Notes Off: CC 123, value 0
                MidiCommand::AllNotesOff { channel } => {
                    self.send(&[0xB0 | (channel & 0x0F), 123, 0])
                }
                MidiCommand::Disconnect => {
                    self.connection = None;
                }
                MidiCommand::Shutdown => {
                    for ch in 0..16u8 {
                        self.send(&[0xB0 | ch, 123, 0]);
                    }
                    break;
                }
            }
        }
    }
}

/// Thread-safe handle to the MIDI output
pub struct MidiOutputHandle {
    command_tx: Sender<MidiCommand>,
    thread: Option<JoinHandle<()>>,
    channel_mode: RwLock<MidiChannelMode>,
    /// (channel, key) pairs currently sounding
    active_notes: Mutex<HashSet<(u8, u8)>>,
    port_name: RwLock<Option<String>>,
}

impl MidiOutputHandle {
    /// Create a handle that is not connected to any port yet
    pub fn new() -> Self {
        let (tx, rx) = channel();
        let thread = thread::spawn(move || MidiOutputInternal::new(rx).run());

        Self {
            command_tx: tx,
            thread: Some(thread),
            channel_mode: RwLock::new(MidiChannelMode::default()),
            active_notes: Mutex::new(HashSet::new()),
            port_name: RwLock::new(None),
        }
    }

    /// List available MIDI output ports.
    ///
    /// Creating a client can fail transiently on macOS, so this retries up
    /// to 3 times.
    pub fn list_ports() -> Result<Vec<String>> {
        let mut last_err = None;
        for attempt in 0..3 {
            if attempt > 0 {
                thread::sleep(std::time::Duration::from_millis(100));
            }
            match MidiOutput::new(CLIENT_NAME) {
                Ok(midi_out) => {
                    return Ok(midi_out
                        .ports()
                        .iter()
                        .filter_map(|p| midi_out.port_name(p).ok())
                        .collect());
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(anyhow!(
            "MIDI initialization failed after 3 attempts: {:?}",
            last_err
        ))
    }

    /// Connect to the first port whose name contains `port_name`.
    /// Returns the full port name.
    pub fn connect(&self, port_name: &str) -> Result<String> {
        let (reply_tx, reply_rx) = channel();
        self.command_tx
            .send(MidiCommand::Connect {
                port_name: port_name.to_string(),
                reply: reply_tx,
            })
            .map_err(|e| anyhow!("Failed to send connect command: {}", e))?;

        let name = reply_rx
            .recv()
            .map_err(|_| anyhow!("MIDI thread is not running"))??;

        *self.port_name.write().unwrap_or_else(PoisonError::into_inner) = Some(name.clone());
        log::debug!("MIDI connected to '{}'", name);
        Ok(name)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.command_tx
            .send(MidiCommand::Disconnect)
            .map_err(|e| anyhow!("Failed to send disconnect: {}", e))?;

        *self.port_name.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected_port().is_some()
    }

    pub fn connected_port(&self) -> Option<String> {
        self.port_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_channel_mode(&self, mode: MidiChannelMode) {
        *self
            .channel_mode
            .write()
            .unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub fn channel_mode(&self) -> MidiChannelMode {
        *self.channel_mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// MIDI channel (0-15) for a track
    pub fn channel_for_track(&self, track: usize) -> u8 {
        match self.channel_mode() {
            MidiChannelMode::PerTrack => (track % 16) as u8,
            MidiChannelMode::Mono(ch) => ch & 0x0F,
        }
    }

    /// Number of notes switched on and not yet off
    pub fn active_count(&self) -> usize {
        self.active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn note_on(&self, note: &Note) -> Result<()> {
        let Some(key) = note.midi_key() else {
            log::debug!("pitch {} outside MIDI range, skipped", note.pitch);
            return Ok(());
        };
        let channel = self.channel_for_track(note.track);

        self.active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((channel, key));

        self.command_tx
            .send(MidiCommand::NoteOn {
                channel,
                key,
                velocity: note.volume,
            })
            .map_err(|e| anyhow!("Failed to send note on: {}", e))
    }

    pub fn note_off(&self, note: &Note) -> Result<()> {
        let Some(key) = note.midi_key() else {
            return Ok(());
        };
        let channel = self.channel_for_track(note.track);

        self.active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(channel, key));

        self.command_tx
            .send(MidiCommand::NoteOff { channel, key })
            .map_err(|e| anyhow!("Failed to send note off: {}", e))
    }

    /// Forward one scheduler event
    pub fn handle_event(&self, event: &PlaybackEvent) -> Result<()> {
        match event {
            PlaybackEvent::NoteOn(note) => self.note_on(note),
            PlaybackEvent::NoteOff(note) => self.note_off(note),
            PlaybackEvent::End => Ok(()),
        }
    }

    /// Switch off every note this handle turned on
    pub fn release_active(&self) -> Result<()> {
        let notes: Vec<(u8, u8)> = self
            .active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        for (channel, key) in notes {
            self.command_tx
                .send(MidiCommand::NoteOff { channel, key })
                .map_err(|e| anyhow!("Failed to send note off: {}", e))?;
        }
        Ok(())
    }

    /// All Notes Off on every channel (MIDI panic)
    pub fn panic_all(&self) -> Result<()> {
        for ch in 0..16u8 {
            self.command_tx
                .send(MidiCommand::AllNotesOff { channel: ch })
                .map_err(|e| anyhow!("Failed to send all notes off: {}", e))?;
        }

        self.active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

impl Default for MidiOutputHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MidiOutputHandle {
    fn drop(&mut self) {
        let _ = self.command_tx.send(MidiCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
