//! Adapter implementations of the port traits.
//!
//! - `live`: GitHub over HTTP and a YAML-directory store.
//! - `memory`: in-process tracker and store with failure injection.
//! - `recording` / `replaying`: cassette capture and playback of tracker calls.

pub mod live;
pub mod memory;
pub mod recording;
pub mod replaying;
