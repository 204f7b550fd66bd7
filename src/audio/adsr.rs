//! ADSR envelope generator for synth voices
//!
//! Exponential segments: attack toward the voice's peak level, decay toward
//! `sustain × peak`, release toward silence once the note-off arrives.
//!
//! # Example
//! ```ignore
//! let mut env = AdsrEnvelope::new(AdsrParams::default(), 44100.0, note.level());
//! env.trigger();
//!
//! // In audio callback:
//! let amplitude = env.next_sample();
//!
//! // On note-off:
//! env.release();
//! ```

/// Envelope stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Envelope timing
///
/// - `attack`, `decay`, `release`: seconds
/// - `sustain`: fraction of the peak level held after decay (0.0-1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrParams {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl AdsrParams {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.max(0.001), // Minimum 1ms to avoid clicks
            decay: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(0.001),
        }
    }
}

impl Default for AdsrParams {
    /// 10 ms attack, 200 ms decay to 80 %, 500 ms release
    fn default() -> Self {
        Self::new(0.01, 0.2, 0.8, 0.5)
    }
}

/// Ln(1000): segments reach 99.9 % of their target in their nominal time
const TIME_CONSTANT: f32 = 6.9;

/// Level below which a releasing envelope counts as silent
const SILENCE: f32 = 0.0001;

fn coefficient(seconds: f32, sample_rate: f32) -> f32 {
    if seconds > 0.0 {
        1.0 - (-TIME_CONSTANT / (seconds * sample_rate)).exp()
    } else {
        1.0
    }
}

/// Per-sample envelope
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    params: AdsrParams,
    stage: EnvelopeStage,
    level: f32,
    peak: f32,
    attack_coeff: f32,
    decay_coeff: f32,
    release_coeff: f32,
}

impl AdsrEnvelope {
    /// `peak` is the level the attack rises to, usually the note's velocity
    pub fn new(params: AdsrParams, sample_rate: f32, peak: f32) -> Self {
        Self {
            params,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            peak: peak.clamp(0.0, 1.0),
            attack_coeff: coefficient(params.attack, sample_rate),
            decay_coeff: coefficient(params.decay, sample_rate),
            release_coeff: coefficient(params.release, sample_rate),
        }
    }

    pub fn trigger(&mut self) {
        self.stage = EnvelopeStage::Attack;
    }

    pub fn release(&mut self) {
        if self.stage != EnvelopeStage::Idle {
            self.stage = EnvelopeStage::Release;
        }
    }

    /// Cut the voice immediately (may click)
    pub fn force_stop(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_finished(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }

    /// Advance one sample and return the amplitude
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }
            EnvelopeStage::Attack => {
                self.level += (self.peak - self.level) * self.attack_coeff;
                if self.level >= self.peak * 0.999 {
                    self.level = self.peak;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                let target = self.peak * self.params.sustain;
                self.level += (target - self.level) * self.decay_coeff;
                if (self.level - target).abs() < 0.001 {
                    self.level = target;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {
                self.level = self.peak * self.params.sustain;
            }
            EnvelopeStage::Release => {
                self.level -= self.level * self.release_coeff;
                if self.level < SILENCE {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    #[test]
    fn test_envelope_idle_start() {
        let env = AdsrEnvelope::new(AdsrParams::default(), SAMPLE_RATE, 1.0);
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_attack_reaches_peak() {
        let mut env = AdsrEnvelope::new(AdsrParams::default(), SAMPLE_RATE, 0.5);
        env.trigger();

        // 10ms at 44100Hz = 441 samples
        let mut max = 0.0f32;
        for _ in 0..1000 {
            max = max.max(env.next_sample());
        }

        assert!((max - 0.5).abs() < 0.001);
        assert_ne!(env.stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn test_sustain_is_relative_to_peak() {
        let mut env = AdsrEnvelope::new(AdsrParams::default(), SAMPLE_RATE, 0.5);
        env.trigger();

        // Attack plus decay, with room to settle
        for _ in 0..(SAMPLE_RATE as usize) {
            env.next_sample();
        }

        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert!((env.level() - 0.4).abs() < 0.001);
    }

    #[test]
    fn test_release_fades_out() {
        let mut env = AdsrEnvelope::new(AdsrParams::new(0.001, 0.01, 0.8, 0.05), SAMPLE_RATE, 1.0);
        env.trigger();
        for _ in 0..2000 {
            env.next_sample();
        }

        env.release();
        let before = env.level();
        env.next_sample();
        assert!(env.level() < before);

        for _ in 0..(SAMPLE_RATE as usize) {
            env.next_sample();
        }
        assert!(env.is_finished());
    }

    #[test]
    fn test_release_during_attack() {
        let mut env = AdsrEnvelope::new(AdsrParams::new(0.1, 0.1, 0.7, 0.1), SAMPLE_RATE, 1.0);
        env.trigger();
        for _ in 0..10 {
            env.next_sample();
        }

        let level_before_release = env.level();
        env.release();
        assert_eq!(env.stage(), EnvelopeStage::Release);
        assert!((env.level() - level_before_release).abs() < 0.01);
    }

    #[test]
    fn test_release_when_idle_is_ignored() {
        let mut env = AdsrEnvelope::new(AdsrParams::default(), SAMPLE_RATE, 1.0);
        env.release();
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn test_output_range() {
        let mut env = AdsrEnvelope::new(AdsrParams::default(), SAMPLE_RATE, 0.8);
        env.trigger();

        for _ in 0..10000 {
            let sample = env.next_sample();
            assert!((0.0..=0.8).contains(&sample), "Sample {} out of range", sample);
        }

        env.release();

        for _ in 0..10000 {
            let sample = env.next_sample();
            assert!((0.0..=0.8).contains(&sample), "Sample {} out of range", sample);
        }
    }
}
