//! CLI argument parsing for perfsieve

use clap::{Parser, ValueEnum};

/// Output format for the final event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable fixed-width lines (default)
    Plain,
    /// One JSON record per event
    Json,
    /// CSV with a header row of field names
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "perfsieve")]
#[command(version)]
#[command(about = "Calculate latency statistics from perf syscall trace data", long_about = None)]
pub struct Cli {
    /// Base for logarithmic histogram bins
    #[arg(long, value_name = "N", default_value = "2")]
    pub base: u32,

    /// Calculate latency histograms per syscall
    #[arg(long)]
    pub stats: bool,

    /// Output all events that take more than [ms]
    #[arg(long = "min-latency", value_name = "MS")]
    pub min_latency: Option<f64>,

    /// Output N events before the matched event
    #[arg(short = 'B', long, value_name = "N")]
    pub before: Option<usize>,

    /// Comma separated list of syscalls to ignore
    #[arg(long, value_name = "LIST")]
    pub ignore: Option<String>,

    /// Comma separated list of syscalls to include
    #[arg(long, value_name = "LIST")]
    pub include: Option<String>,

    /// Output top N syscalls by latency
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Calculate latency from first receive to next send
    #[arg(long = "recv-to-send")]
    pub recv_to_send: bool,

    /// Filter out first datasyncs after opening a file
    #[arg(long = "ignore-first-datasync")]
    pub ignore_first_datasync: bool,

    /// Calculate amount of data fdatasynced
    #[arg(long = "amount-datasync")]
    pub amount_datasync: bool,

    /// Calculate time since last fdatasync
    #[arg(long = "delta-datasync")]
    pub delta_datasync: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "plain")]
    pub format: OutputFormat,

    /// Enable verbose internal logging on stderr
    #[arg(long)]
    pub debug: bool,

    /// Trace files to parse (stdin when empty)
    pub files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["perfsieve"]);
        assert_eq!(cli.base, 2);
        assert!(!cli.stats);
        assert_eq!(cli.min_latency, None);
        assert_eq!(cli.format, OutputFormat::Plain);
        assert!(cli.files.is_empty());
    }

    #[test]
    fn test_cli_parses_files() {
        let cli = Cli::parse_from(["perfsieve", "a.trace", "b.trace.gz"]);
        assert_eq!(cli.files, ["a.trace", "b.trace.gz"]);
    }

    #[test]
    fn test_cli_threshold_with_lookback() {
        let cli = Cli::parse_from(["perfsieve", "--min-latency", "10", "-B", "5"]);
        assert_eq!(cli.min_latency, Some(10.0));
        assert_eq!(cli.before, Some(5));
    }

    #[test]
    fn test_cli_stats_with_base() {
        let cli = Cli::parse_from(["perfsieve", "--stats", "--base", "10"]);
        assert!(cli.stats);
        assert_eq!(cli.base, 10);
    }

    #[test]
    fn test_cli_format_selector() {
        let cli = Cli::parse_from(["perfsieve", "--format", "csv"]);
        assert_eq!(cli.format, OutputFormat::Csv);
    }

    #[test]
    fn test_cli_analysis_flags() {
        let cli = Cli::parse_from([
            "perfsieve",
            "--recv-to-send",
            "--ignore-first-datasync",
            "--amount-datasync",
            "--delta-datasync",
        ]);
        assert!(cli.recv_to_send);
        assert!(cli.ignore_first_datasync);
        assert!(cli.amount_datasync);
        assert!(cli.delta_datasync);
    }

    #[test]
    fn test_cli_include_ignore_lists() {
        let cli = Cli::parse_from(["perfsieve", "--include", "pwrite64,fdatasync", "--ignore", "sys_*"]);
        assert_eq!(cli.include.as_deref(), Some("pwrite64,fdatasync"));
        assert_eq!(cli.ignore.as_deref(), Some("sys_*"));
    }
}
