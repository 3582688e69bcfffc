//! Event stream filter stages
//!
//! Include/exclude by syscall name or glob, latency threshold with
//! lookback context, and top-N selection by duration.

use std::collections::{HashSet, VecDeque};

use anyhow::Result;
use regex::Regex;

use crate::event::Event;

/// Matches operation names against a comma-separated clause list.
///
/// Any clause containing a `*` wildcard switches the whole filter into
/// glob mode: each clause becomes an anchored alternative where `*`
/// matches anything and a trailing `*` leaves the end open. Without
/// wildcards the filter is an exact-name set test.
#[derive(Debug, Clone)]
pub struct NameFilter {
    matcher: NameMatcher,
}

#[derive(Debug, Clone)]
enum NameMatcher {
    Exact(HashSet<String>),
    Glob(Regex),
}

impl NameFilter {
    pub fn new(list: &str) -> Result<Self> {
        let clauses: Vec<&str> = list.split(',').collect();
        let matcher = if clauses.iter().any(|clause| clause.contains('*')) {
            let mut alternatives = Vec::with_capacity(clauses.len());
            for clause in &clauses {
                let (body, anchor) = match clause.strip_suffix('*') {
                    Some(body) => (body, ""),
                    None => (*clause, "$"),
                };
                let gap = body
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*");
                alternatives.push(format!("^{gap}{anchor}"));
            }
            NameMatcher::Glob(Regex::new(&alternatives.join("|"))?)
        } else {
            NameMatcher::Exact(clauses.into_iter().map(str::to_string).collect())
        };
        Ok(Self { matcher })
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            NameMatcher::Exact(set) => set.contains(name),
            NameMatcher::Glob(regex) => regex.is_match(name),
        }
    }
}

/// Keep only events whose syscall name matches the filter
pub fn include_events<I>(events: I, filter: NameFilter) -> impl Iterator<Item = Event>
where
    I: Iterator<Item = Event>,
{
    events.filter(move |event| filter.matches(&event.syscall))
}

/// Drop events whose syscall name matches the filter
pub fn ignore_events<I>(events: I, filter: NameFilter) -> impl Iterator<Item = Event>
where
    I: Iterator<Item = Event>,
{
    events.filter(move |event| !filter.matches(&event.syscall))
}

/// Lazily yields every event slower than the threshold, preceded by up
/// to `before` context events.
///
/// The lookback FIFO is fed by every event and never cleared on a
/// match, so overlapping lookback windows re-emit context events.
pub struct ThresholdEvents<I> {
    inner: I,
    /// Threshold in seconds
    threshold: f64,
    before: Option<usize>,
    lookback: VecDeque<Event>,
    pending: VecDeque<Event>,
}

/// `threshold_ms` is in milliseconds, matching the CLI surface
pub fn threshold_events<I>(inner: I, threshold_ms: f64, before: Option<usize>) -> ThresholdEvents<I>
where
    I: Iterator<Item = Event>,
{
    ThresholdEvents {
        inner,
        threshold: threshold_ms / 1000.0,
        before: before.filter(|&n| n > 0),
        lookback: VecDeque::new(),
        pending: VecDeque::new(),
    }
}

impl<I: Iterator<Item = Event>> Iterator for ThresholdEvents<I> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let event = self.inner.next()?;
            if event.duration > self.threshold {
                self.pending.extend(self.lookback.iter().cloned());
                self.pending.push_back(event.clone());
            }
            if let Some(n) = self.before {
                if self.lookback.len() == n {
                    self.lookback.pop_front();
                }
                self.lookback.push_back(event);
            }
        }
    }
}

/// The `n` events with greatest duration, descending, ties arbitrary.
///
/// Terminal-order-breaking: consumes the entire input before producing
/// output and discards chronological order.
pub fn top_events<I>(events: I, n: usize) -> std::vec::IntoIter<Event>
where
    I: Iterator<Item = Event>,
{
    let mut all: Vec<Event> = events.collect();
    all.sort_by(|a, b| b.duration.total_cmp(&a.duration));
    all.truncate(n);
    all.into_iter()
}
