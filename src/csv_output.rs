//! CSV output with a header row of the event's field names

use std::io::{self, Write};

use crate::event::Event;

/// Column order matches the [`Event`] field order
pub const HEADER: &str = "filename,line,pid,time,duration,syscall,detail,returncode,fd";

/// Write the header row and one row per event. Broken pipe is normal
/// termination.
pub fn write_events(events: impl Iterator<Item = Event>, mut out: impl Write) -> io::Result<()> {
    match writeln!(out, "{HEADER}") {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
        result => result?,
    }
    for event in events {
        match writeln!(out, "{}", format_row(&event)) {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            result => result?,
        }
    }
    Ok(())
}

fn format_row(event: &Event) -> String {
    [
        escape_field(&event.filename),
        event.line.to_string(),
        event.pid.to_string(),
        event.time.to_string(),
        event.duration.to_string(),
        escape_field(&event.syscall),
        escape_field(event.detail.as_deref().unwrap_or("")),
        event.returncode.to_string(),
        event.fd.map(|fd| fd.to_string()).unwrap_or_default(),
    ]
    .join(",")
}

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
