//! Correlation analyses over the ordered event stream
//!
//! Each analysis is a small per-key state machine that consumes the
//! event stream in order and yields derived events. State is scoped to
//! one source file: a change of the event's filename resets it, so
//! multi-file runs never correlate records across files.

pub mod datasync;
pub mod recv_send;

pub use datasync::{amount_datasync, delta_datasync, ignore_first_datasync};
pub use recv_send::recv_to_send_latency;
