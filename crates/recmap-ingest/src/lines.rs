//! Text line source for non-tabular tables.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::error::{IngestError, Result};

/// Yields the lines of a text stream as UTF-8 strings.
///
/// Line endings (`\n` or `\r\n`) and a leading byte-order mark are removed.
/// Invalid UTF-8 sequences are replaced.
pub struct TextLines<R> {
    reader: R,
    buf: Vec<u8>,
    first: bool,
    done: bool,
}

impl<R: BufRead> TextLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            first: true,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for TextLines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                let mut bytes = self.buf.as_slice();
                if let Some(rest) = bytes.strip_suffix(b"\n") {
                    bytes = rest.strip_suffix(b"\r").unwrap_or(rest);
                }
                if std::mem::take(&mut self.first) {
                    bytes = bytes.strip_prefix("\u{feff}".as_bytes()).unwrap_or(bytes);
                }
                Some(Ok(String::from_utf8_lossy(bytes).into_owned()))
            }
            Err(err) => {
                self.done = true;
                Some(Err(IngestError::Io(err)))
            }
        }
    }
}

/// Opens a text file as a line source.
pub fn open_lines(path: &Path) -> Result<TextLines<BufReader<File>>> {
    let file = File::open(path).map_err(|err| IngestError::open(path, err))?;
    debug!(path = %path.display(), "opened line source");
    Ok(TextLines::new(BufReader::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endings_and_bom_are_stripped() {
        let input: &[u8] = b"\xef\xbb\xbfStart\r\nbody\n\nEnd";
        let lines: Vec<String> = TextLines::new(input).map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["Start", "body", "", "End"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let input: &[u8] = b"caf\xe9\n";
        let lines: Vec<String> = TextLines::new(input).map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["caf\u{fffd}"]);
    }
}
