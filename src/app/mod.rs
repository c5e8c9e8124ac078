//! Recorder wiring.

pub mod setup;
