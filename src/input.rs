//! Input source selection and decompression transports
//!
//! Trace files are plain text, optionally compressed; the transport is
//! selected by filename suffix. A suffix whose decompressor is not
//! compiled in is a fatal, reported condition: silently reading raw
//! bytes would corrupt every downstream analysis.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use flate2::read::GzDecoder;
use thiserror::Error;

use crate::event::Event;
use crate::parser::EventStream;

/// Errors opening a trace source
#[derive(Error, Debug)]
pub enum InputError {
    #[error("can't open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("can't process {path}: {reason}")]
    Unsupported { path: String, reason: &'static str },
}

/// Open one trace source, wrapping it in the decompressor its suffix
/// selects
pub fn open_source(path: &str) -> Result<Box<dyn BufRead>, InputError> {
    if path.ends_with(".zst") || path.ends_with(".zstd") {
        return open_zstd(path);
    }
    if path.ends_with(".lz4") {
        return Err(InputError::Unsupported {
            path: path.to_string(),
            reason: "lz4 decompression support is not available",
        });
    }
    let file = open_file(path)?;
    if path.ends_with(".gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(feature = "zstd")]
fn open_zstd(path: &str) -> Result<Box<dyn BufRead>, InputError> {
    let file = open_file(path)?;
    let decoder = zstd::stream::read::Decoder::new(file).map_err(|source| InputError::Open {
        path: path.to_string(),
        source,
    })?;
    Ok(Box::new(BufReader::new(decoder)))
}

#[cfg(not(feature = "zstd"))]
fn open_zstd(path: &str) -> Result<Box<dyn BufRead>, InputError> {
    Err(InputError::Unsupported {
        path: path.to_string(),
        reason: "zstd decompression support is not compiled in",
    })
}

fn open_file(path: &str) -> Result<File, InputError> {
    File::open(path).map_err(|source| InputError::Open {
        path: path.to_string(),
        source,
    })
}

/// Lazily concatenated event stream over the given trace files.
///
/// Sources are opened up front so a bad path or unsupported suffix is
/// reported before any output is produced. Each file gets a fresh
/// parser, so in-flight correlation state never leaks across files.
pub fn events_from_files(paths: &[String]) -> Result<Box<dyn Iterator<Item = Event>>, InputError> {
    let mut streams = Vec::with_capacity(paths.len());
    for path in paths {
        let reader = open_source(path)?;
        streams.push(EventStream::new(reader, path.clone()));
    }
    Ok(Box::new(streams.into_iter().flatten()))
}

/// Event stream over standard input, with `-` as the source identifier
pub fn events_from_stdin() -> Box<dyn Iterator<Item = Event>> {
    Box::new(EventStream::new(BufReader::new(io::stdin()), "-"))
}
