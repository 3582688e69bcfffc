//! Perfsieve - latency analysis for `perf script` kernel trace output
//!
//! This library parses raw trace text (syscall enter/exit and block
//! I/O issue/complete records), reconstructs duration-bearing events
//! by pairing asynchronous begin/end records, and applies a composable
//! set of single-pass streaming analyses: latency histograms,
//! threshold-based anomaly extraction, top-N ranking, and several
//! correlation analyses over the ordered event stream.

pub mod analysis;
pub mod cli;
pub mod csv_output;
pub mod event;
pub mod filter;
pub mod histogram;
pub mod input;
pub mod json_output;
pub mod parser;
pub mod pipeline;
pub mod text_output;
