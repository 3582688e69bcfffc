//! fdatasync-centric analyses
//!
//! First-sync suppression, per-descriptor byte accounting, and
//! inter-sync delta timing. All three reduce the stream to `fdatasync`
//! events only.

use std::collections::HashMap;

use crate::event::Event;

const SYNC_SYSCALL: &str = "fdatasync";
const OPEN_SYSCALL: &str = "openat";
const WRITE_SYSCALL: &str = "pwrite64";

/// Per-descriptor key: an fd number is only meaningful within its pid
type FdKey = (i32, Option<i64>);

/// Drops the first `fdatasync` after each `openat`, passing through
/// subsequent ones until the next open.
///
/// Before any open is seen a sync counts as already seen, so a sync
/// with no preceding open is never suppressed (it is dropped with the
/// rest of the non-sync stream).
pub struct IgnoreFirstDatasync<I> {
    inner: I,
    cur_file: Option<String>,
    seen_sync: bool,
}

pub fn ignore_first_datasync<I>(inner: I) -> IgnoreFirstDatasync<I>
where
    I: Iterator<Item = Event>,
{
    IgnoreFirstDatasync {
        inner,
        cur_file: None,
        seen_sync: true,
    }
}

impl<I: Iterator<Item = Event>> Iterator for IgnoreFirstDatasync<I> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            let event = self.inner.next()?;
            if self.cur_file.as_deref() != Some(event.filename.as_str()) {
                self.cur_file = Some(event.filename.clone());
                self.seen_sync = true;
            }
            if event.syscall == OPEN_SYSCALL {
                self.seen_sync = false;
            }
            if event.syscall == SYNC_SYSCALL && !self.seen_sync {
                self.seen_sync = true;
                return Some(event);
            }
        }
    }
}

/// Replaces each `fdatasync` event's detail with the number of bytes
/// written to that (pid, fd) since its previous sync.
///
/// Accumulators deliberately survive file boundaries: a descriptor's
/// write total is drained only by its sync.
pub struct AmountDatasync<I> {
    inner: I,
    amounts: HashMap<FdKey, i64>,
}

pub fn amount_datasync<I>(inner: I) -> AmountDatasync<I>
where
    I: Iterator<Item = Event>,
{
    AmountDatasync {
        inner,
        amounts: HashMap::new(),
    }
}

impl<I: Iterator<Item = Event>> Iterator for AmountDatasync<I> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            let event = self.inner.next()?;
            if event.syscall == WRITE_SYSCALL && event.returncode > 0 {
                *self.amounts.entry((event.pid, event.fd)).or_insert(0) += event.returncode;
            }
            if event.syscall == SYNC_SYSCALL {
                let amount = self.amounts.remove(&(event.pid, event.fd)).unwrap_or(0);
                return Some(event.with_detail(amount.to_string()));
            }
        }
    }
}

/// Replaces each `fdatasync` event's detail with the signed time since
/// the previous sync on the same (pid, fd) completed.
///
/// The previous sync's completion is its event time minus its
/// duration, so the delta can be negative when syncs overlap. State
/// resets at file boundaries.
pub struct DeltaDatasync<I> {
    inner: I,
    last_syncs: HashMap<FdKey, Event>,
    cur_file: Option<String>,
}

pub fn delta_datasync<I>(inner: I) -> DeltaDatasync<I>
where
    I: Iterator<Item = Event>,
{
    DeltaDatasync {
        inner,
        last_syncs: HashMap::new(),
        cur_file: None,
    }
}

impl<I: Iterator<Item = Event>> Iterator for DeltaDatasync<I> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            let event = self.inner.next()?;
            if self.cur_file.as_deref() != Some(event.filename.as_str()) {
                self.cur_file = Some(event.filename.clone());
                self.last_syncs.clear();
            }
            if event.syscall == SYNC_SYSCALL {
                let key = (event.pid, event.fd);
                let emitted = self
                    .last_syncs
                    .remove(&key)
                    .map(|last| event.with_detail((event.time - event.duration - last.time).to_string()));
                self.last_syncs.insert(key, event);
                if emitted.is_some() {
                    return emitted;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(syscall: &str, time: f64, returncode: i64, fd: Option<i64>) -> Event {
        Event {
            filename: "t".to_string(),
            line: 0,
            pid: 7,
            time,
            duration: 0.0,
            syscall: syscall.to_string(),
            detail: None,
            returncode,
            fd,
        }
    }

    #[test]
    fn test_first_sync_after_open_is_suppressed() {
        let events = vec![
            event("openat", 0.0, 5, None),
            event("fdatasync", 1.0, 0, Some(5)),
            event("fdatasync", 2.0, 0, Some(5)),
        ];
        let out: Vec<Event> = ignore_first_datasync(events.into_iter()).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].time, 2.0);
    }

    #[test]
    fn test_sync_without_open_is_not_suppressed_but_stream_is_sync_only() {
        let events = vec![
            event("pwrite64", 0.0, 100, Some(5)),
            event("fdatasync", 1.0, 0, Some(5)),
        ];
        let out: Vec<Event> = ignore_first_datasync(events.into_iter()).collect();
        // No open seen: the sync is treated as already-seen state and
        // everything is dropped.
        assert!(out.is_empty());
    }

    #[test]
    fn test_each_open_rearms_suppression() {
        let events = vec![
            event("openat", 0.0, 5, None),
            event("fdatasync", 1.0, 0, Some(5)),
            event("fdatasync", 2.0, 0, Some(5)),
            event("openat", 3.0, 6, None),
            event("fdatasync", 4.0, 0, Some(6)),
            event("fdatasync", 5.0, 0, Some(6)),
        ];
        let out: Vec<f64> = ignore_first_datasync(events.into_iter())
            .map(|e| e.time)
            .collect();
        assert_eq!(out, [2.0, 5.0]);
    }

    #[test]
    fn test_suppression_rearms_on_file_change() {
        let mut events = vec![
            event("openat", 0.0, 5, None),
            event("fdatasync", 1.0, 0, Some(5)),
            event("fdatasync", 2.0, 0, Some(5)),
        ];
        let mut second = events.clone();
        for evt in &mut second {
            evt.filename = "other".to_string();
        }
        events.append(&mut second);
        let out: Vec<Event> = ignore_first_datasync(events.into_iter()).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].filename, "t");
        assert_eq!(out[1].filename, "other");
    }

    #[test]
    fn test_amount_accumulates_writes_until_sync() {
        let events = vec![
            event("pwrite64", 0.0, 100, Some(5)),
            event("pwrite64", 1.0, 50, Some(5)),
            event("fdatasync", 2.0, 0, Some(5)),
            event("fdatasync", 3.0, 0, Some(5)),
        ];
        let out: Vec<Event> = amount_datasync(events.into_iter()).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].detail.as_deref(), Some("150"));
        // Accumulator was drained by the first sync.
        assert_eq!(out[1].detail.as_deref(), Some("0"));
    }

    #[test]
    fn test_amount_ignores_failed_writes() {
        let events = vec![
            event("pwrite64", 0.0, -11, Some(5)),
            event("pwrite64", 1.0, 100, Some(5)),
            event("fdatasync", 2.0, 0, Some(5)),
        ];
        let out: Vec<Event> = amount_datasync(events.into_iter()).collect();
        assert_eq!(out[0].detail.as_deref(), Some("100"));
    }

    #[test]
    fn test_amount_keys_by_pid_and_fd() {
        let mut other_pid = event("pwrite64", 0.0, 999, Some(5));
        other_pid.pid = 8;
        let events = vec![
            other_pid,
            event("pwrite64", 1.0, 100, Some(5)),
            event("pwrite64", 2.0, 200, Some(6)),
            event("fdatasync", 3.0, 0, Some(5)),
        ];
        let out: Vec<Event> = amount_datasync(events.into_iter()).collect();
        // Only pid 7 / fd 5 writes count toward pid 7's sync.
        assert_eq!(out[0].detail.as_deref(), Some("100"));
    }

    #[test]
    fn test_delta_measures_from_previous_sync_completion() {
        let mut first = event("fdatasync", 1.0, 0, Some(5));
        first.duration = 0.1;
        let mut second = event("fdatasync", 5.0, 0, Some(5));
        second.duration = 0.2;
        let out: Vec<Event> = delta_datasync(vec![first, second].into_iter()).collect();
        assert_eq!(out.len(), 1);
        // 5.0 - 0.2 - 1.0
        let delta: f64 = out[0].detail.as_deref().unwrap().parse().unwrap();
        assert!((delta - 3.8).abs() < 1e-9);
    }

    #[test]
    fn test_delta_first_sync_yields_nothing_but_is_recorded() {
        let events = vec![
            event("fdatasync", 1.0, 0, Some(5)),
            event("fdatasync", 2.0, 0, Some(5)),
            event("fdatasync", 3.0, 0, Some(5)),
        ];
        let out: Vec<Event> = delta_datasync(events.into_iter()).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].time, 2.0);
        assert_eq!(out[1].time, 3.0);
    }

    #[test]
    fn test_delta_can_be_negative() {
        let mut first = event("fdatasync", 1.0, 0, Some(5));
        first.duration = 0.0;
        let mut second = event("fdatasync", 1.5, 0, Some(5));
        second.duration = 1.0;
        let out: Vec<Event> = delta_datasync(vec![first, second].into_iter()).collect();
        let delta: f64 = out[0].detail.as_deref().unwrap().parse().unwrap();
        assert!((delta + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_delta_resets_on_file_change() {
        let mut first = event("fdatasync", 1.0, 0, Some(5));
        first.duration = 0.0;
        let mut second = event("fdatasync", 5.0, 0, Some(5));
        second.filename = "other".to_string();
        let out: Vec<Event> = delta_datasync(vec![first, second].into_iter()).collect();
        assert!(out.is_empty());
    }
}
