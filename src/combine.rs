//! Stream combination.
//!
//! Concatenates prepender fragments, per-file streams (each followed
//! by the kind delimiter) and appender fragments into one sink, in
//! that fixed order. Input streams are borrowed, never closed here.

use std::io::{self, Read, Write};

/// Write the combined output into `out`. Returns total bytes written.
pub fn combine<W: Write, R: Read>(
    out: &mut W,
    streams: &mut [R],
    delimiter: &str,
    prependers: &[String],
    appenders: &[String],
) -> io::Result<u64> {
    let mut written = 0u64;

    for fragment in prependers {
        out.write_all(fragment.as_bytes())?;
        written += fragment.len() as u64;
    }

    for stream in streams {
        written += io::copy(stream, out)?;
        out.write_all(delimiter.as_bytes())?;
        written += delimiter.len() as u64;
    }

    for fragment in appenders {
        out.write_all(fragment.as_bytes())?;
        written += fragment.len() as u64;
    }

    Ok(written)
}
