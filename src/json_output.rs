//! JSON output: one structured record per event
//!
//! The record is a lossless serialization of [`Event`]; parsing a line
//! back yields the identical event, including the present-vs-absent
//! distinction on `fd` and `detail`.

use std::io::{self, Write};

use crate::event::Event;

/// Write one JSON object per line. Broken pipe is normal termination.
pub fn write_events(events: impl Iterator<Item = Event>, mut out: impl Write) -> io::Result<()> {
    for event in events {
        match write_event(&mut out, &event) {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            result => result?,
        }
    }
    Ok(())
}

fn write_event(out: &mut impl Write, event: &Event) -> io::Result<()> {
    serde_json::to_writer(&mut *out, event)?;
    writeln!(out)
}
