//! Core engine: the fetch → normalise → score → publish loop.

pub mod collector;
pub mod normalizer;
pub mod scorer;
pub mod publisher;
pub mod scheduler;
