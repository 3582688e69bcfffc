//! Stage composition
//!
//! Builds the single lazy event pipeline from the CLI configuration.
//! Stages compose in a fixed order: include/exclude, recv-to-send,
//! first-sync suppression, byte accounting, delta timing, threshold,
//! top-N. The terminal (histogram or serializer) is dispatched by the
//! caller.

use anyhow::Result;

use crate::analysis;
use crate::cli::Cli;
use crate::event::Event;
use crate::filter::{self, NameFilter};
use crate::input;

/// Compose the configured stages over the configured input sources
pub fn build_events(cli: &Cli) -> Result<Box<dyn Iterator<Item = Event>>> {
    let mut events: Box<dyn Iterator<Item = Event>> = if cli.files.is_empty() {
        input::events_from_stdin()
    } else {
        input::events_from_files(&cli.files)?
    };

    if let Some(list) = &cli.ignore {
        events = Box::new(filter::ignore_events(events, NameFilter::new(list)?));
    }
    if let Some(list) = &cli.include {
        events = Box::new(filter::include_events(events, NameFilter::new(list)?));
    }

    if cli.recv_to_send {
        events = Box::new(analysis::recv_to_send_latency(events));
    }
    if cli.ignore_first_datasync {
        events = Box::new(analysis::ignore_first_datasync(events));
    }
    if cli.amount_datasync {
        events = Box::new(analysis::amount_datasync(events));
    }
    if cli.delta_datasync {
        events = Box::new(analysis::delta_datasync(events));
    }

    if let Some(threshold_ms) = cli.min_latency {
        events = Box::new(filter::threshold_events(events, threshold_ms, cli.before));
    }
    if let Some(n) = cli.top {
        events = Box::new(filter::top_events(events, n));
    }
    Ok(events)
}
