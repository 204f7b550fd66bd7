//! Player configuration
//!
//! Built in three layers: [`PlayerConfig::default`], then environment
//! variables ([`PlayerConfig::from_env`]), then command-line flags applied by
//! `main`.

use crate::audio::midi::MidiChannelMode;
use anyhow::{anyhow, Result};
use std::fmt;
use std::str::FromStr;

pub const ENV_OUTPUT: &str = "MML_OUTPUT";
pub const ENV_MIDI_PORT: &str = "MML_MIDI_PORT";
pub const ENV_VOLUME: &str = "MML_VOLUME";

/// Where playback events go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Print events to the terminal
    #[default]
    Console,
    /// FM synth on the default audio device
    Synth,
    /// Connected MIDI port
    Midi,
}

impl FromStr for OutputMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "print" => Ok(OutputMode::Console),
            "synth" | "audio" => Ok(OutputMode::Synth),
            "midi" => Ok(OutputMode::Midi),
            other => Err(anyhow!(
                "Unknown output '{}'. Expected console, synth or midi",
                other
            )),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputMode::Console => "console",
            OutputMode::Synth => "synth",
            OutputMode::Midi => "midi",
        };
        write!(f, "{}", name)
    }
}

/// Parse a master volume percentage (0-100)
pub fn parse_volume(s: &str) -> Result<u8> {
    let value: u8 = s
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid volume '{}'. Expected 0-100", s.trim()))?;
    if value > 100 {
        return Err(anyhow!("Volume {} out of range. Expected 0-100", value));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub output: OutputMode,
    /// Master volume percentage
    pub volume: u8,
    /// MIDI port to connect at startup (partial name match)
    pub midi_port: Option<String>,
    pub channel_mode: MidiChannelMode,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            output: OutputMode::Console,
            volume: 50,
            midi_port: None,
            channel_mode: MidiChannelMode::PerTrack,
        }
    }
}

impl PlayerConfig {
    /// Defaults overridden by `MML_OUTPUT`, `MML_MIDI_PORT` and `MML_VOLUME`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(output) = lookup(ENV_OUTPUT) {
            config.output = output.parse()?;
        }
        if let Some(port) = lookup(ENV_MIDI_PORT).filter(|p| !p.trim().is_empty()) {
            config.midi_port = Some(port);
        }
        if let Some(volume) = lookup(ENV_VOLUME) {
            config.volume = parse_volume(&volume)?;
        }

        Ok(config)
    }
}
