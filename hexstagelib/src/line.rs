//! The `line` module splits the serial byte stream into text lines.

use std::io::{BufRead, ErrorKind};

/// Longest line kept; the rest of a longer line is discarded.
pub const MAX_LINE_LEN: usize = 1024;

/// Blocking, order preserving producer of text lines.
pub trait LineSource {
    /// Next non-empty line without its terminator, or `None` once the input is closed.
    ///
    /// # Errors
    /// Returns any I/O error of the underlying input.
    fn next_line(&mut self) -> std::io::Result<Option<Vec<u8>>>;
}

/// Reads lines terminated by `\n` or `\r` from any [`BufRead`].
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
}

impl<R: BufRead> LineReader<R> {
    pub const fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

const fn is_terminator(c: u8) -> bool {
    c == b'\n' || c == b'\r'
}

fn append_bounded(line: &mut Vec<u8>, chunk: &[u8]) {
    let room = MAX_LINE_LEN.saturating_sub(line.len());
    line.extend_from_slice(&chunk[..chunk.len().min(room)]);
}

impl<R: BufRead> LineSource for LineReader<R> {
    fn next_line(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();

        loop {
            let (consumed, complete) = {
                let available = match self.inner.fill_buf() {
                    Ok(buf) => buf,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };

                // End of input - hand out a final unterminated line
                if available.is_empty() {
                    return Ok((!line.is_empty()).then_some(line));
                }

                match available.iter().position(|&c| is_terminator(c)) {
                    Some(pos) => {
                        append_bounded(&mut line, &available[..pos]);
                        (pos + 1, true)
                    }
                    None => {
                        append_bounded(&mut line, available);
                        (available.len(), false)
                    }
                }
            };
            self.inner.consume(consumed);

            // Skip the empty line between '\r' and '\n' (and any blank lines)
            if complete && !line.is_empty() {
                return Ok(Some(line));
            }
        }
    }
}
