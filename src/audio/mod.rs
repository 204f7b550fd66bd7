pub mod adsr;
pub mod event_dispatcher;
pub mod midi;
pub mod scheduler;
pub mod synth;
pub mod timer;

pub use adsr::{AdsrEnvelope, AdsrParams};
pub use timer::{DelayScheduler, ThreadTimer, VirtualTimer};
