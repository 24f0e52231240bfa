//! Streaming reader for MNIST-style CSV files.
//!
//! Format: no header, one record per line (LF or CRLF), each record
//! `label,pixel_0,...,pixel_783` as ASCII decimal integers. Only the current
//! line is held in memory.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::data::sample::{Sample, IMAGE_PIXELS};
use crate::error::{Error, Result};

/// Forward-only iterator over the rows of one CSV file.
///
/// Once exhausted it keeps returning `None`; open the file again to re-read.
pub struct DatasetReader<R = BufReader<File>> {
    reader: R,
    buf: Vec<u8>,
    path: PathBuf,
    row: usize,
    done: bool,
}

impl DatasetReader {
    /// Opens `path` for reading. Fails with [`Error::Io`] if it cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Ok(DatasetReader::from_reader(BufReader::new(file), path))
    }
}

impl<R: BufRead> DatasetReader<R> {
    /// Reads rows from any buffered source; `path` is used only in error messages.
    pub fn from_reader(reader: R, path: impl Into<PathBuf>) -> Self {
        DatasetReader { reader, buf: Vec::new(), path: path.into(), row: 0, done: false }
    }
}

impl<R: BufRead> Iterator for DatasetReader<R> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(Error::io(self.path.clone(), e)));
                }
            }
            self.row += 1;

            // Bytes that are not text are a bad cell, not a read failure.
            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim_end_matches(['\n', '\r']),
                Err(e) => {
                    return Some(Err(Error::MalformedRow {
                        row: self.row,
                        reason: format!("invalid UTF-8 at byte {}", e.valid_up_to()),
                    }))
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(parse_row(line, self.row));
        }
        None
    }
}

/// Parses one `label,p0,...,p783` record. `row` is 1-based, for diagnostics.
pub fn parse_row(line: &str, row: usize) -> Result<Sample> {
    let mut cells = line.split(',');
    let label_cell = cells.next().unwrap_or("");
    let label = label_cell.trim().parse::<i64>().map_err(|_| Error::MalformedRow {
        row,
        reason: format!("label '{}' is not an integer", label_cell),
    })?;

    let mut pixels = Vec::with_capacity(IMAGE_PIXELS);
    for (col, cell) in cells.enumerate() {
        if pixels.len() == IMAGE_PIXELS {
            return Err(Error::MalformedRow {
                row,
                reason: format!("expected {} columns, got more", IMAGE_PIXELS + 1),
            });
        }
        let value = cell.trim().parse::<u8>().map_err(|_| Error::MalformedRow {
            row,
            reason: format!("pixel {} '{}' is not an integer in 0..=255", col, cell),
        })?;
        pixels.push(value);
    }
    if pixels.len() != IMAGE_PIXELS {
        return Err(Error::MalformedRow {
            row,
            reason: format!("expected {} columns, got {}", IMAGE_PIXELS + 1, pixels.len() + 1),
        });
    }
    Ok(Sample { label, pixels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn row(label: &str, fill: u8) -> String {
        let mut cells = vec![label.to_string()];
        cells.extend(std::iter::repeat(fill.to_string()).take(IMAGE_PIXELS));
        cells.join(",")
    }

    fn reader(text: String) -> DatasetReader<Cursor<Vec<u8>>> {
        DatasetReader::from_reader(Cursor::new(text.into_bytes()), "inline.csv")
    }

    #[test]
    fn reads_lf_and_crlf_rows() {
        let text = format!("{}\r\n{}\n{}", row("3", 0), row("7", 255), row("0", 12));
        let samples: Vec<Sample> = reader(text).map(|r| r.unwrap()).collect();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].label, 3);
        assert_eq!(samples[1].pixels[783], 255);
        assert_eq!(samples[2].pixels.len(), IMAGE_PIXELS);
    }

    #[test]
    fn skips_blank_lines_and_stays_exhausted() {
        let mut it = reader(format!("{}\n\n", row("1", 1)));
        assert!(it.next().unwrap().is_ok());
        assert!(it.next().is_none());
        assert!(it.next().is_none());
    }

    #[test]
    fn short_row_is_malformed() {
        let err = parse_row("5,1,2,3", 4).unwrap_err();
        assert!(matches!(err, Error::MalformedRow { row: 4, .. }));
    }

    #[test]
    fn long_row_is_malformed() {
        let line = format!("{},9", row("5", 0));
        assert!(matches!(parse_row(&line, 1), Err(Error::MalformedRow { .. })));
    }

    #[test]
    fn non_numeric_and_out_of_range_pixels_are_malformed() {
        let line = row("5", 0).replacen(",0", ",x", 1);
        assert!(matches!(parse_row(&line, 1), Err(Error::MalformedRow { .. })));
        let line = row("5", 0).replacen(",0", ",256", 1);
        assert!(matches!(parse_row(&line, 1), Err(Error::MalformedRow { .. })));
        assert!(matches!(parse_row(&row("five", 0), 1), Err(Error::MalformedRow { .. })));
    }

    #[test]
    fn non_utf8_cell_is_malformed() {
        let mut bytes = format!("{}\n", row("1", 0)).into_bytes();
        bytes.extend_from_slice(b"2,\xff\xfe");
        bytes.extend_from_slice(row("", 0)[1..].as_bytes());
        let mut it = DatasetReader::from_reader(Cursor::new(bytes), "inline.csv");
        assert!(it.next().unwrap().is_ok());
        assert!(matches!(it.next(), Some(Err(Error::MalformedRow { row: 2, .. }))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = DatasetReader::open("/definitely/not/here.csv").err().unwrap();
        assert!(matches!(err, Error::Io { .. }));
    }
}
