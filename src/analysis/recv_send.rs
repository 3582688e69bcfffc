//! Receive-to-send round-trip latency attribution
//!
//! Measures the latency from receiving data to sending the
//! acknowledgment for it, attributing the elapsed time to the syscalls
//! executed in between. Assumes the stream contains events from a
//! single connection-handling process; mixing processes produces
//! meaningless correlations.

use std::collections::{HashMap, VecDeque};

use crate::event::Event;

const RECV_SYSCALL: &str = "recvfrom";
const WRITE_SYSCALL: &str = "pwrite64";
const SEND_SYSCALL: &str = "sendto";

/// Yields one synthesized `recv-to-send` event per completed
/// receive/write/send round trip; all input events are consumed.
pub struct RecvToSend<I> {
    inner: I,
    /// Time of the last received packet not yet followed by a write
    buffered_recv: Option<f64>,
    /// Receive time of the data covered by the most recent write
    written_recv: Option<f64>,
    /// Events accumulated while either anchor is set
    relevant: VecDeque<Event>,
    cur_file: Option<String>,
}

pub fn recv_to_send_latency<I>(inner: I) -> RecvToSend<I>
where
    I: Iterator<Item = Event>,
{
    RecvToSend {
        inner,
        buffered_recv: None,
        written_recv: None,
        relevant: VecDeque::new(),
        cur_file: None,
    }
}

impl<I: Iterator<Item = Event>> RecvToSend<I> {
    fn process(&mut self, event: Event) -> Option<Event> {
        if self.cur_file.as_deref() != Some(event.filename.as_str()) {
            self.buffered_recv = None;
            self.written_recv = None;
            self.cur_file = Some(event.filename.clone());
            self.relevant.clear();
        }

        let mut emitted = None;
        if event.syscall == RECV_SYSCALL && event.returncode > 0 && self.buffered_recv.is_none() {
            self.buffered_recv = Some(event.time);
        } else if event.syscall == WRITE_SYSCALL {
            if self.written_recv.is_none() {
                self.written_recv = self.buffered_recv;
            }
            self.buffered_recv = None;
        } else if event.syscall == SEND_SYSCALL {
            if let Some(written_recv) = self.written_recv {
                emitted = Some(self.synthesize(&event, written_recv));
                self.written_recv = None;
                match self.buffered_recv {
                    // All received data has been replied to; nothing
                    // left worth attributing.
                    None => self.relevant.clear(),
                    Some(buffered) => {
                        while self.relevant.front().is_some_and(|e| e.time < buffered) {
                            self.relevant.pop_front();
                        }
                    }
                }
            }
        }

        if self.buffered_recv.is_some() || self.written_recv.is_some() {
            self.relevant.push_back(event);
        }
        emitted
    }

    /// Build the `recv-to-send` event for a send at `event.time`
    /// acknowledging data received at `written_recv`.
    fn synthesize(&self, event: &Event, written_recv: f64) -> Event {
        let mut attributed: HashMap<&str, f64> = HashMap::new();
        for evt in &self.relevant {
            if evt.time >= written_recv {
                *attributed.entry(evt.syscall.as_str()).or_default() += evt.duration;
            }
        }

        let total = event.time - written_recv;
        let accounted: f64 = attributed.values().sum();
        attributed.insert("none", total - accounted);

        let mut shares: Vec<(&str, f64)> = attributed.into_iter().collect();
        shares.sort_by(|a, b| b.1.total_cmp(&a.1));
        let breakdown = shares
            .iter()
            .filter(|(_, duration)| *duration > total / 1000.0)
            .map(|(syscall, duration)| format!("{syscall}: {:.1}%", duration / total * 100.0))
            .collect::<Vec<_>>()
            .join(", ");

        Event {
            filename: event.filename.clone(),
            line: event.line,
            pid: event.pid,
            time: event.time,
            duration: total,
            syscall: "recv-to-send".to_string(),
            detail: Some(breakdown),
            returncode: 0,
            fd: None,
        }
    }
}

impl<I: Iterator<Item = Event>> Iterator for RecvToSend<I> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            let event = self.inner.next()?;
            if let Some(emitted) = self.process(event) {
                return Some(emitted);
            }
        }
    }
}
