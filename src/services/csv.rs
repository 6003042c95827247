use std::fs::{self, File};
use std::io::{self, Write};
use std::mem::take;
use std::path::Path;

use crate::error::Result;

/// Comma-separated table with a header row.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// First row is the header; a leading UTF-8 BOM is ignored.
    pub fn parse(text: &str) -> Self {
        let mut rows = parse_rows(text.trim_start_matches('\u{feff}'));
        if rows.is_empty() {
            return Self::default();
        }
        let headers = rows
            .remove(0)
            .into_iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        Self { headers, rows }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Trimmed, non-empty cell value.
    pub fn cell<'r>(&self, row: &'r [String], column: Option<usize>) -> Option<&'r str> {
        column
            .and_then(|i| row.get(i))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Quote-aware CSV parser tolerant of CRLF line endings.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if row.len() == 1 && row[0].is_empty() {
                    row.clear();
                } else {
                    rows.push(take(&mut row));
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\n', '\r'])
}

pub fn write_row<W: Write>(mut w: W, row: &[String]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    writeln!(w)
}

/// Write header and rows to a sibling temp file, then rename over `path`.
pub fn write_atomic(path: &Path, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("csv.tmp");
    let written = (|| -> io::Result<()> {
        let mut file = io::BufWriter::new(File::create(&tmp)?);
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        write_row(&mut file, &headers)?;
        for row in rows {
            write_row(&mut file, row)?;
        }
        file.flush()?;
        file.get_ref().sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
