use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
}

/// In-memory tabular dataset with a header row. Cells are kept as text in the
/// form they take on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. Width is checked when the table is encoded.
    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.rows
            .push(row.into_iter().map(|cell| cell.to_string()).collect());
    }

    /// Builds a table from serializable records; field names become columns.
    pub fn from_records<T: Serialize>(records: &[T]) -> Result<Self, PayloadError> {
        let mut writer = csv_writer();
        for record in records {
            writer.serialize(record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Self::from_csv(&bytes)
    }

    pub fn from_csv(bytes: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes);

        let columns = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self { columns, rows })
    }

    /// Encodes as CSV: header row first, `\n` after every record. Rows whose
    /// width differs from the header are rejected.
    pub fn to_csv(&self) -> Result<Vec<u8>, PayloadError> {
        if self.columns.is_empty() && self.rows.is_empty() {
            return Ok(Vec::new());
        }
        let mut writer = csv_writer();
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| PayloadError::Csv(csv::Error::from(e.into_error())))
    }

    /// Decodes every row into `T`, in row order.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<Vec<T>, PayloadError> {
        let bytes = self.to_csv()?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes.as_slice());
        let mut records = Vec::with_capacity(self.rows.len());
        for record in reader.deserialize() {
            records.push(record?);
        }
        Ok(records)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

/// Renders the table with padded columns for terminal output.
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let width = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(width),
                    None => widths.push(width),
                }
            }
        }

        write_padded(f, &self.columns, &widths)?;
        for row in &self.rows {
            write_padded(f, row, &widths)?;
        }
        Ok(())
    }
}

fn write_padded(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(f, "{}", line.trim_end())
}

/// Source of an object body, resolved to bytes only when a write happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    RawBytes(Vec<u8>),
    FilePath(PathBuf),
    Tabular(Table),
}

impl Payload {
    /// Reads the file or encodes the table into the object body.
    pub fn materialize(self) -> Result<Vec<u8>, PayloadError> {
        match self {
            Payload::RawBytes(bytes) => Ok(bytes),
            Payload::FilePath(path) => match fs::read(&path) {
                Ok(bytes) => Ok(bytes),
                Err(source) => Err(PayloadError::Io { path, source }),
            },
            Payload::Tabular(table) => table.to_csv(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Payload::Tabular(_) => CSV_CONTENT_TYPE,
            Payload::RawBytes(_) | Payload::FilePath(_) => BINARY_CONTENT_TYPE,
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::RawBytes(bytes)
    }
}

impl From<PathBuf> for Payload {
    fn from(path: PathBuf) -> Self {
        Payload::FilePath(path)
    }
}

impl From<Table> for Payload {
    fn from(table: Table) -> Self {
        Payload::Tabular(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::NamedTempFile;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        a: i64,
        b: String,
    }

    #[derive(Debug, Serialize)]
    struct Reading {
        id: u32,
        val: f64,
    }

    #[test]
    fn test_records_round_trip_in_order() {
        let rows = vec![
            Row { a: 1, b: "x".into() },
            Row { a: 2, b: "y".into() },
        ];
        let table = Table::from_records(&rows).unwrap();
        assert_eq!(table.columns(), ["a", "b"]);

        let decoded = Table::from_csv(&table.to_csv().unwrap()).unwrap();
        assert_eq!(decoded.deserialize::<Row>().unwrap(), rows);
    }

    #[test]
    fn test_csv_encoding_uses_header_and_newlines() {
        let table = Table::from_records(&[Reading { id: 1, val: 10.5 }]).unwrap();
        assert_eq!(table.to_csv().unwrap(), b"id,val\n1,10.5\n");
    }

    #[test]
    fn test_cells_needing_quotes() {
        let mut table = Table::new(["name", "note"]);
        table.push_row(["a,b", "say \"hi\""]);
        let bytes = table.to_csv().unwrap();
        assert_eq!(bytes, b"name,note\n\"a,b\",\"say \"\"hi\"\"\"\n");
        assert_eq!(Table::from_csv(&bytes).unwrap(), table);
    }

    #[test]
    fn test_ragged_row_fails_to_encode() {
        let mut table = Table::new(["a", "b"]);
        table.push_row([1]);
        assert!(matches!(table.to_csv(), Err(PayloadError::Csv(_))));
    }

    #[test]
    fn test_file_payload_reads_contents() {
        let mut file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"file body").unwrap();

        let payload = Payload::from(file.path().to_path_buf());
        assert_eq!(payload.materialize().unwrap(), b"file body");
    }

    #[test]
    fn test_missing_file_payload() {
        let payload = Payload::FilePath(PathBuf::from("/definitely/not/here.csv"));
        let err = payload.materialize().unwrap_err();
        assert!(matches!(err, PayloadError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }

    #[test]
    fn test_display_pads_columns() {
        let mut table = Table::new(["id", "name"]);
        table.push_row(["1", "alpha"]);
        table.push_row(["100", "b"]);
        assert_eq!(table.to_string(), "id   name\n1    alpha\n100  b\n");
    }
}
