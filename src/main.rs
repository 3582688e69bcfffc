use std::io;

use anyhow::Result;
use clap::Parser;
use perfsieve::cli::{Cli, OutputFormat};
use perfsieve::histogram::{LatencyHistogram, DEFAULT_MIN_DURATION};
use perfsieve::{csv_output, json_output, pipeline, text_output};
use tracing_subscriber::EnvFilter;

/// Initialize the diagnostic subscriber on stderr. Malformed-line
/// warnings are always on; --debug raises the default level.
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let show_filename = args.files.len() > 1;
    let events = pipeline::build_events(&args)?;

    let stdout = io::stdout();
    let result = if args.stats {
        let histogram =
            LatencyHistogram::build(events, f64::from(args.base), DEFAULT_MIN_DURATION);
        histogram.render(stdout.lock())
    } else {
        match args.format {
            OutputFormat::Plain => text_output::write_events(events, stdout.lock(), show_filename),
            OutputFormat::Json => json_output::write_events(events, stdout.lock()),
            OutputFormat::Csv => csv_output::write_events(events, stdout.lock()),
        }
    };

    match result {
        // Downstream consumer went away; not an error for a batch
        // filter feeding a pipe.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        result => Ok(result?),
    }
}
