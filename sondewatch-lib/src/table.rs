//! Splitting of the raw delimited feed into a header and data rows.
//!
//! The feed is plain delimited text with no quoting or escaping: every line is
//! split verbatim on the delimiter. A value containing the delimiter therefore
//! shifts the following cells of that row.

use crate::error::SondeError;

/// Field delimiter detected from the header line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Semicolon,
    Comma,
}

impl Delimiter {
    /// Semicolon if the header contains one, comma otherwise
    pub fn detect(header_line: &str) -> Self {
        if header_line.contains(';') {
            Delimiter::Semicolon
        } else {
            Delimiter::Comma
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Delimiter::Semicolon => ';',
            Delimiter::Comma => ',',
        }
    }
}

/// A parsed feed: normalised header plus the untouched data lines
#[derive(Debug, Clone)]
pub struct RawTable<'a> {
    delimiter: Delimiter,
    headers: Vec<String>,
    lines: Vec<&'a str>,
}

impl<'a> RawTable<'a> {
    /// Parse a raw feed body.
    ///
    /// Lines are split on LF or CRLF and blank lines are dropped. A header and
    /// at least one data line are required, otherwise [`SondeError::NoData`].
    pub fn parse(text: &'a str) -> Result<Self, SondeError> {
        let mut lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.trim().is_empty());

        let header_line = lines.next().ok_or(SondeError::NoData)?;
        let lines: Vec<&'a str> = lines.collect();
        if lines.is_empty() {
            return Err(SondeError::NoData);
        }

        let delimiter = Delimiter::detect(header_line);
        let headers = header_line
            .split(delimiter.as_char())
            .map(|cell| cell.trim().to_lowercase())
            .collect();

        Ok(Self {
            delimiter,
            headers,
            lines,
        })
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    /// Lower-cased, trimmed header cells
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data lines (header excluded)
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterate the data rows, each with its 1-based line number in the feed
    pub fn rows(&self) -> impl Iterator<Item = (usize, RawRow<'a>)> + '_ {
        let sep = self.delimiter.as_char();
        self.lines
            .iter()
            .enumerate()
            .map(move |(i, line)| (i + 1, RawRow::split(line, sep)))
    }
}

/// Cells of a single data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow<'a> {
    cells: Vec<&'a str>,
}

impl<'a> RawRow<'a> {
    fn split(line: &'a str, sep: char) -> Self {
        Self {
            cells: line.split(sep).collect(),
        }
    }

    /// Trimmed cell at `index`, empty when absent or out of range
    pub fn cell(&self, index: Option<usize>) -> &'a str {
        index
            .and_then(|i| self.cells.get(i))
            .map(|cell| cell.trim())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_header_and_row() {
        assert!(matches!(RawTable::parse(""), Err(SondeError::NoData)));
        assert!(matches!(RawTable::parse("sonde;lat;lon\n\n  \n"), Err(SondeError::NoData)));
    }

    #[test]
    fn test_detects_delimiter_and_normalises_header() {
        let table = RawTable::parse(" SONDE ; Latitude;Longitude\r\nA;1;2\r\n").unwrap();
        assert_eq!(table.delimiter(), Delimiter::Semicolon);
        assert_eq!(table.headers(), ["sonde", "latitude", "longitude"]);
        assert_eq!(table.len(), 1);

        let table = RawTable::parse("id,lat,lon\nA,1,2\nB,3,4").unwrap();
        assert_eq!(table.delimiter(), Delimiter::Comma);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_cells_are_verbatim_and_trimmed() {
        let table = RawTable::parse("id;desc\nS1; hello, world ;extra").unwrap();
        let (line, row) = table.rows().next().unwrap();
        assert_eq!(line, 1);
        assert_eq!(row.len(), 3);
        assert_eq!(row.cell(Some(1)), "hello, world");
        assert_eq!(row.cell(Some(7)), "");
        assert_eq!(row.cell(None), "");
    }
}
