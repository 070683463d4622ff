use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use csv::StringRecord;

use crate::error::{AppError, Result};
use crate::models::NewsRow;

const SNIFF_BYTES: u64 = 1024;
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

const HEADLINE_COLUMNS: &[&str] = &["Headlines", "Headline"];
const TIMESTAMP_COLUMNS: &[&str] = &["Time", "Date"];
const DESCRIPTION_COLUMNS: &[&str] = &["Description", "Content"];

/// Guess the field delimiter from the start of a file. A delimiter wins when it
/// appears the same, non-zero number of times on every complete sampled line.
pub fn sniff_delimiter(sample: &[u8]) -> u8 {
    let text = String::from_utf8_lossy(sample);
    let mut lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    // The last line is likely cut off by the sample boundary.
    if sample.len() as u64 >= SNIFF_BYTES && lines.len() > 1 {
        lines.pop();
    }
    let Some(header) = lines.first() else {
        return b',';
    };

    let consistent = DELIMITERS
        .iter()
        .copied()
        .filter_map(|delimiter| {
            let first = count_unquoted(header, delimiter);
            let steady = lines.iter().all(|l| count_unquoted(l, delimiter) == first);
            (first > 0 && steady).then_some((first, delimiter))
        })
        .max_by_key(|(count, _)| *count);
    if let Some((_, delimiter)) = consistent {
        return delimiter;
    }

    DELIMITERS
        .iter()
        .copied()
        .map(|delimiter| (count_unquoted(header, delimiter), delimiter))
        .filter(|(count, _)| *count > 0)
        .max_by_key(|(count, _)| *count)
        .map(|(_, delimiter)| delimiter)
        .unwrap_or(b',')
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Header positions for each logical field, in alias priority order.
#[derive(Debug, Default)]
struct ColumnMap {
    headline: Vec<usize>,
    timestamp: Vec<usize>,
    description: Vec<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Self {
        let find = |aliases: &[&str]| -> Vec<usize> {
            aliases
                .iter()
                .filter_map(|alias| {
                    headers
                        .iter()
                        .position(|h| h.trim().eq_ignore_ascii_case(alias))
                })
                .collect()
        };
        Self {
            headline: find(HEADLINE_COLUMNS),
            timestamp: find(TIMESTAMP_COLUMNS),
            description: find(DESCRIPTION_COLUMNS),
        }
    }

    fn is_blank(&self) -> bool {
        self.headline.is_empty() && self.description.is_empty()
    }

    fn row(&self, record: &StringRecord) -> NewsRow {
        let pick = |columns: &[usize]| -> String {
            columns
                .iter()
                .filter_map(|&i| record.get(i))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .unwrap_or_default()
                .to_string()
        };
        NewsRow {
            headline: pick(&self.headline),
            timestamp: pick(&self.timestamp),
            description: pick(&self.description),
        }
    }
}

/// Streams [`NewsRow`]s out of a delimited news file.
pub struct NewsReader {
    reader: csv::Reader<File>,
    columns: ColumnMap,
    delimiter: u8,
}

impl NewsReader {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::InputNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut sample = Vec::new();
        (&mut file).take(SNIFF_BYTES).read_to_end(&mut sample)?;
        file.seek(SeekFrom::Start(0))?;
        let delimiter = sniff_delimiter(&sample);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(file);
        let columns = ColumnMap::from_headers(reader.headers()?);
        if columns.is_blank() {
            tracing::warn!(
                path = %path.display(),
                "no headline or description column found; every row will be skipped"
            );
        }

        tracing::debug!(path = %path.display(), delimiter = %(delimiter as char).escape_default(), "opened news file");
        Ok(Self {
            reader,
            columns,
            delimiter,
        })
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Remaining rows. Records that cannot be decoded are logged and skipped.
    pub fn rows(&mut self) -> impl Iterator<Item = NewsRow> + '_ {
        let columns = &self.columns;
        self.reader
            .records()
            .enumerate()
            .filter_map(move |(index, record)| match record {
                Ok(record) => Some(columns.row(&record)),
                Err(e) => {
                    tracing::warn!(line = index + 2, error = %e, "skipping unreadable record");
                    None
                }
            })
    }
}
