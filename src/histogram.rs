//! Logarithmic latency histogram over the event stream
//!
//! Terminal stage: consumes the whole stream and produces a per-syscall
//! table of bucket counts, where bucket = floor(log_base(duration)).

use std::collections::HashMap;
use std::io::{self, Write};

use crate::event::Event;

/// Durations below this floor land in a single sentinel bucket
pub const DEFAULT_MIN_DURATION: f64 = 1e-6;

/// Per-syscall occurrence counts over log-scaled duration buckets
#[derive(Debug)]
pub struct LatencyHistogram {
    base: f64,
    /// Syscall names in first-encountered order (column order)
    columns: Vec<String>,
    counts: HashMap<String, HashMap<i64, u64>>,
}

impl LatencyHistogram {
    /// Consume the event stream and bucket every duration.
    ///
    /// Durations under `min_duration` fall into the sentinel bucket
    /// `floor(log_base(min_duration)) - 1`, one below the smallest
    /// regular bucket.
    pub fn build(events: impl Iterator<Item = Event>, base: f64, min_duration: f64) -> Self {
        let min_bucket = min_duration.log(base).floor() as i64 - 1;
        let mut columns = Vec::new();
        let mut counts: HashMap<String, HashMap<i64, u64>> = HashMap::new();
        for event in events {
            let bucket = if event.duration >= min_duration {
                event.duration.log(base).floor() as i64
            } else {
                min_bucket
            };
            if !counts.contains_key(&event.syscall) {
                columns.push(event.syscall.clone());
            }
            *counts
                .entry(event.syscall)
                .or_default()
                .entry(bucket)
                .or_insert(0) += 1;
        }
        Self {
            base,
            columns,
            counts,
        }
    }

    /// Bucket counts recorded for one syscall
    pub fn bucket_counts(&self, syscall: &str) -> Option<&HashMap<i64, u64>> {
        self.counts.get(syscall)
    }

    /// Render the table: one right-aligned column per syscall, one row
    /// per bucket over the contiguous min..=max range, rows labelled
    /// with the bucket's lower-bound latency in milliseconds.
    pub fn render(&self, mut out: impl Write) -> io::Result<()> {
        let buckets = self.counts.values().flat_map(|counts| counts.keys());
        let Some((&min_bucket, &max_bucket)) =
            buckets.clone().min().zip(buckets.max())
        else {
            return Ok(());
        };

        let widths: Vec<usize> = self
            .columns
            .iter()
            .map(|syscall| {
                let widest_count = self.counts[syscall]
                    .values()
                    .map(|count| count.to_string().len())
                    .max()
                    .unwrap_or(0);
                widest_count.max(syscall.len())
            })
            .collect();

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(syscall, &width)| format!("{syscall:>width$}"))
            .collect();
        writeln!(out, "{:12} {}", "latency [ms]", header.join(" "))?;

        for bucket in min_bucket..=max_bucket {
            let min_latency = 1000.0 * self.base.powi(bucket as i32);
            let cells: Vec<String> = self
                .columns
                .iter()
                .zip(&widths)
                .map(|(syscall, &width)| match self.counts[syscall].get(&bucket) {
                    Some(count) => format!("{count:>width$}"),
                    None => format!("{:>width$}", ""),
                })
                .collect();
            writeln!(out, "{min_latency:12.3} {}", cells.join(" "))?;
        }
        Ok(())
    }
}
