//! Trace line decoding and begin/end event reconstruction
//!
//! Consumes `perf script` text output line by line and pairs
//! asynchronous records into single duration-bearing [`Event`]s:
//! `sys_enter_*`/`sys_exit_*` records are correlated per pid,
//! `block_rq_issue`/`block_rq_complete` records per (device, sector).
//! Events come out in the order their completing record appears.

use std::collections::HashMap;
use std::io::BufRead;

use regex::Regex;
use tracing::warn;

use crate::event::Event;

/// Grammar of one `perf script` line:
/// `<command> <pid> [<cpu>] <timestamp>: <category>:<subtype>: <args>`.
/// The command field may contain embedded spaces (e.g. kernel worker
/// names), so the first capture deliberately allows space-joined words
/// that do not start with a digit.
const LINE_PATTERN: &str = r"^ *([a-zA-Z/0-9#.:_-]+(?: [^ 0-9][#a-zA-Z/0-9:-]*)*)\s+(\d+)\s\[(\d+)\]\s+([0-9.]+):\s+([^: ]+):([^ ]+):\s*(.*)";

/// One decoded trace line, before begin/end pairing
#[derive(Debug, Clone, PartialEq)]
pub struct TraceLine {
    pub command: String,
    pub pid: i32,
    pub cpu: u32,
    pub time: f64,
    pub category: String,
    pub subtype: String,
    pub args: String,
}

/// A begun-but-not-yet-completed syscall, keyed by pid
#[derive(Debug, Clone)]
struct InflightSyscall {
    name: String,
    pid: i32,
    time: f64,
    fd: Option<i64>,
}

impl InflightSyscall {
    fn into_event(self, filename: &str, line: u64, time: f64, returncode: i64) -> Event {
        Event {
            filename: filename.to_string(),
            line,
            pid: self.pid,
            time,
            duration: time - self.time,
            syscall: self.name,
            detail: None,
            returncode,
            fd: self.fd,
        }
    }
}

/// An issued-but-not-yet-completed block request, keyed by (device, sector)
#[derive(Debug, Clone)]
struct InflightBio {
    issue_time: f64,
    op: String,
    nbytes: String,
}

/// Reconstructs events from decoded trace lines.
///
/// All correlation state is owned by the parser instance, so multiple
/// independent reconstructions can run in the same process. One parser
/// is used per input file; in-flight state never crosses file
/// boundaries.
#[derive(Debug)]
pub struct TraceParser {
    filename: String,
    line_re: Regex,
    running_syscalls: HashMap<i32, InflightSyscall>,
    inflight_io: HashMap<String, HashMap<String, InflightBio>>,
    line_no: u64,
}

impl TraceParser {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            line_re: Regex::new(LINE_PATTERN).expect("trace line pattern is valid"),
            running_syscalls: HashMap::new(),
            inflight_io: HashMap::new(),
            line_no: 0,
        }
    }

    /// Source identifier events from this parser carry
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Decode one raw line into its structured fields.
    ///
    /// Returns `None` for blank lines, continuation lines belonging to
    /// a multi-line stack-trace block, and malformed lines. Only the
    /// malformed case emits a diagnostic; none of them abort the run.
    pub fn decode_line(&self, raw: &str) -> Option<TraceLine> {
        if raw.is_empty() || raw.starts_with('\t') || raw.starts_with('\n') {
            return None;
        }
        let Some(caps) = self.line_re.captures(raw) else {
            warn!(source = %self.filename, line = self.line_no, "invalid line: {raw:?}");
            return None;
        };
        let (pid, cpu, time) = match (
            caps[2].parse::<i32>(),
            caps[3].parse::<u32>(),
            caps[4].parse::<f64>(),
        ) {
            (Ok(pid), Ok(cpu), Ok(time)) => (pid, cpu, time),
            _ => {
                warn!(source = %self.filename, line = self.line_no, "invalid line: {raw:?}");
                return None;
            }
        };
        Some(TraceLine {
            command: caps[1].to_string(),
            pid,
            cpu,
            time,
            category: caps[5].to_string(),
            subtype: caps[6].to_string(),
            args: caps[7].to_string(),
        })
    }

    /// Feed one raw line; returns an event if this line completes an
    /// in-flight operation.
    pub fn push_line(&mut self, raw: &str) -> Option<Event> {
        self.line_no += 1;
        let line = self.decode_line(raw)?;
        match line.category.as_str() {
            "syscalls" => self.on_syscall(line),
            "block" => self.on_block(line),
            _ => None,
        }
    }

    fn on_syscall(&mut self, line: TraceLine) -> Option<Event> {
        if let Some(name) = line.subtype.strip_prefix("sys_enter_") {
            let fd = line
                .args
                .split(", ")
                .next()
                .and_then(|first| first.strip_prefix("fd: "))
                .and_then(parse_hex_u64)
                .map(|v| v as i64);
            // A second enter for the same pid silently overwrites the
            // first; a kernel thread has at most one outstanding
            // traced syscall.
            self.running_syscalls.insert(
                line.pid,
                InflightSyscall {
                    name: name.to_string(),
                    pid: line.pid,
                    time: line.time,
                    fd,
                },
            );
            None
        } else if let Some(name) = line.subtype.strip_prefix("sys_exit_") {
            let inflight = self.running_syscalls.remove(&line.pid)?;
            if inflight.name != name {
                // Exit does not match the outstanding enter. The trace
                // may start mid-operation; drop both records.
                return None;
            }
            let returncode = parse_signed_hex(line.args.trim())?;
            Some(inflight.into_event(&self.filename, self.line_no, line.time, returncode))
        } else {
            None
        }
    }

    fn on_block(&mut self, line: TraceLine) -> Option<Event> {
        match line.subtype.as_str() {
            "block_rq_issue" => {
                // 253,2 WS 2048 () 1074153538 + 4 [postmaster]
                let mut fields = line.args.splitn(8, ' ');
                let (Some(device), Some(op), Some(nbytes), Some(_), Some(sector)) = (
                    fields.next(),
                    fields.next(),
                    fields.next(),
                    fields.next(),
                    fields.next(),
                ) else {
                    warn!(source = %self.filename, line = self.line_no, "invalid block issue: {:?}", line.args);
                    return None;
                };
                self.inflight_io.entry(device.to_string()).or_default().insert(
                    sector.to_string(),
                    InflightBio {
                        issue_time: line.time,
                        op: op.to_string(),
                        nbytes: nbytes.to_string(),
                    },
                );
                None
            }
            "block_rq_complete" => {
                // 253,2 WS () 1074153538 + 4 [0]
                let mut fields = line.args.splitn(7, ' ');
                let (Some(device), Some(_op), Some(_), Some(sector)) =
                    (fields.next(), fields.next(), fields.next(), fields.next())
                else {
                    warn!(source = %self.filename, line = self.line_no, "invalid block complete: {:?}", line.args);
                    return None;
                };
                let bio = self.inflight_io.get_mut(device)?.remove(sector)?;
                Some(Event {
                    filename: self.filename.clone(),
                    line: self.line_no,
                    pid: line.pid,
                    time: line.time,
                    duration: line.time - bio.issue_time,
                    syscall: format!("block_rq({})", bio.op),
                    detail: Some(device.to_string()),
                    returncode: bio.nbytes.parse().unwrap_or(0),
                    fd: None,
                })
            }
            _ => None,
        }
    }
}

/// Decode a hexadecimal value with optional `0x` prefix
fn parse_hex_u64(s: &str) -> Option<u64> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).ok()
}

/// Decode a two's-complement hexadecimal return value into `i64`.
/// Values with the high bit set are negative.
fn parse_signed_hex(s: &str) -> Option<i64> {
    parse_hex_u64(s).map(|v| v as i64)
}

/// Lazy event stream over a line-oriented reader.
///
/// Pulling one event performs exactly the upstream line reads needed
/// to produce it. Read errors end the stream with a diagnostic.
pub struct EventStream<R> {
    parser: TraceParser,
    lines: std::io::Lines<R>,
}

impl<R: BufRead> EventStream<R> {
    pub fn new(reader: R, filename: impl Into<String>) -> Self {
        Self {
            parser: TraceParser::new(filename),
            lines: reader.lines(),
        }
    }
}

impl<R: BufRead> Iterator for EventStream<R> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            match self.lines.next()? {
                Ok(line) => {
                    if let Some(event) = self.parser.push_line(&line) {
                        return Some(event);
                    }
                }
                Err(err) => {
                    warn!(source = %self.parser.filename, "read error: {err}");
                    return None;
                }
            }
        }
    }
}
