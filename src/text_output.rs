//! Human-readable fixed-width event listing

use std::io::{self, Write};

use crate::event::Event;

/// Write events one per line.
///
/// A closed consumer (broken pipe) ends the listing silently; partial
/// output to a pager or `head` is the normal case, not an error.
pub fn write_events(
    events: impl Iterator<Item = Event>,
    mut out: impl Write,
    show_filename: bool,
) -> io::Result<()> {
    for event in events {
        match write_event(&mut out, &event, show_filename) {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            result => result?,
        }
    }
    Ok(())
}

fn write_event(out: &mut impl Write, event: &Event, show_filename: bool) -> io::Result<()> {
    if show_filename {
        write!(out, "{}:{:<8} ", event.filename, event.line)?;
    }
    let fd = match event.fd {
        Some(fd) => format!("(fd={fd})"),
        None => String::new(),
    };
    writeln!(
        out,
        "{} {:16.6} {:7.3} {}{} = {} {}",
        event.pid,
        event.time,
        event.duration * 1000.0,
        event.syscall,
        fd,
        event.returncode,
        event.detail.as_deref().unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        Event {
            filename: "trace.txt".to_string(),
            line: 12,
            pid: 4242,
            time: 100.000250,
            duration: 0.0025,
            syscall: "pwrite64".to_string(),
            detail: None,
            returncode: 8192,
            fd: Some(5),
        }
    }

    #[test]
    fn test_plain_line_format() {
        let mut out = Vec::new();
        write_events(std::iter::once(sample_event()), &mut out, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "4242       100.000250   2.500 pwrite64(fd=5) = 8192 \n");
    }

    #[test]
    fn test_filename_prefix_when_enabled() {
        let mut out = Vec::new();
        write_events(std::iter::once(sample_event()), &mut out, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("trace.txt:12       "));
    }

    #[test]
    fn test_fd_omitted_when_absent() {
        let event = Event {
            fd: None,
            detail: Some("253,2".to_string()),
            ..sample_event()
        };
        let mut out = Vec::new();
        write_events(std::iter::once(event), &mut out, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("pwrite64 = 8192 253,2"));
    }
}
