// src/table/format.rs
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Serialize, Deserialize};
use tracing::{debug, trace};

use crate::error::{UtilResult, UtilError};
use super::frame::{Cell, Table};

/// Tabular file layouts understood by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Tsv,
    JsonLines,
}

/// Compression wrapped around a tabular file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
}

impl FileFormat {
    /// Infer format and compression from the file name, e.g. `part_0.csv.gz`
    pub fn infer(path: &Path) -> (FileFormat, Compression) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let (stem, compression) = match name.strip_suffix(".gz") {
            Some(stem) => (stem, Compression::Gzip),
            None => (name.as_str(), Compression::None),
        };

        let format = match stem.rsplit_once('.').map(|(_, ext)| ext) {
            Some("tsv") | Some("tab") => FileFormat::Tsv,
            Some("jsonl") | Some("ndjson") | Some("json") => FileFormat::JsonLines,
            _ => FileFormat::Csv,
        };

        (format, compression)
    }

    fn default_delimiter(self) -> u8 {
        match self {
            FileFormat::Tsv => b'\t',
            _ => b',',
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = UtilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            other => Err(UtilError::InvalidInput(format!("Unknown compression: {}", other))),
        }
    }
}

/// Options applied to every file read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Overrides the compression inferred from the file name
    pub compression: Option<Compression>,
    /// Overrides the format inferred from the file name
    pub format: Option<FileFormat>,
    pub delimiter: Option<u8>,
    pub has_headers: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            compression: None,
            format: None,
            delimiter: None,
            has_headers: true,
        }
    }
}

impl ReadOptions {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn resolve(&self, path: &Path) -> (FileFormat, Compression) {
        let (format, compression) = FileFormat::infer(path);
        (self.format.unwrap_or(format), self.compression.unwrap_or(compression))
    }
}

/// Options for writing a table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteOptions {
    pub compression: Option<Compression>,
    pub format: Option<FileFormat>,
}

/// Read and parse a single tabular file
pub fn read_table(path: &Path, options: &ReadOptions) -> UtilResult<Table> {
    let (format, compression) = options.resolve(path);
    trace!("Reading {} as {:?} ({:?})", path.display(), format, compression);

    let file = File::open(path).map_err(|e| UtilError::FileError {
        path: path.to_path_buf(),
        message: format!("Failed to open file: {}", e),
    })?;

    let reader: Box<dyn Read> = match compression {
        Compression::Gzip => Box::new(GzDecoder::new(file)),
        Compression::None => Box::new(file),
    };
    let reader = BufReader::new(reader);

    let table = match format {
        FileFormat::Csv | FileFormat::Tsv => {
            let delimiter = options.delimiter.unwrap_or_else(|| format.default_delimiter());
            read_delimited(reader, delimiter, options.has_headers, path)?
        }
        FileFormat::JsonLines => read_json_lines(reader, path)?,
    };

    debug!("Read {} rows x {} columns from {}", table.n_rows(), table.n_cols(), path.display());
    Ok(table)
}

fn read_delimited<R: Read>(reader: R, delimiter: u8, has_headers: bool, path: &Path) -> UtilResult<Table> {
    let parse_error = |e: csv::Error| UtilError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .from_reader(reader);

    let mut columns: Option<Vec<String>> = if has_headers {
        let headers = csv_reader.headers().map_err(parse_error)?;
        Some(headers.iter().map(str::to_string).collect())
    } else {
        None
    };

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(parse_error)?;
        // Headerless files get positional column names
        let columns = columns.get_or_insert_with(|| (0..record.len()).map(|i| i.to_string()).collect());
        if record.len() != columns.len() {
            return Err(UtilError::ParseError {
                path: path.to_path_buf(),
                message: format!("Expected {} fields, found {}", columns.len(), record.len()),
            });
        }
        rows.push(record.iter().map(Cell::parse).collect());
    }

    Table::from_rows(columns.unwrap_or_default(), rows)
}

fn read_json_lines<R: BufRead>(reader: R, path: &Path) -> UtilResult<Table> {
    let mut records = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| UtilError::FileError {
            path: path.to_path_buf(),
            message: format!("Failed to read line {}: {}", line_no + 1, e),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&line)
            .map_err(|e| UtilError::ParseError {
                path: path.to_path_buf(),
                message: format!("Line {}: {}", line_no + 1, e),
            })?;
        records.push(record);
    }

    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows: Vec<Vec<Cell>> = records
        .into_iter()
        .map(|mut record| {
            columns
                .iter()
                .map(|c| match record.remove(c) {
                    Some(serde_json::Value::Number(n)) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
                    Some(serde_json::Value::String(s)) if s.is_empty() => Cell::Empty,
                    Some(serde_json::Value::String(s)) => Cell::Text(s),
                    Some(serde_json::Value::Null) | None => Cell::Empty,
                    Some(other) => Cell::Text(other.to_string()),
                })
                .collect()
        })
        .collect();

    Table::from_rows(columns, rows)
}

/// Write a table, compressing when the name ends in `.gz` or compression is forced
pub fn write_table(table: &Table, path: &Path, options: &WriteOptions) -> UtilResult<()> {
    let (inferred_format, inferred_compression) = FileFormat::infer(path);
    let format = options.format.unwrap_or(inferred_format);
    let compression = options.compression.unwrap_or(inferred_compression);

    let io_error = |e: std::io::Error| UtilError::FileError {
        path: path.to_path_buf(),
        message: format!("Failed to write file: {}", e),
    };

    let file = BufWriter::new(File::create(path).map_err(io_error)?);

    match compression {
        Compression::Gzip => {
            let encoder = GzEncoder::new(file, flate2::Compression::default());
            let encoder = write_to(table, encoder, format, path)?;
            encoder.finish().map_err(io_error)?.flush().map_err(io_error)?;
        }
        Compression::None => {
            write_to(table, file, format, path)?.flush().map_err(io_error)?;
        }
    }

    debug!("Wrote {} rows to {}", table.n_rows(), path.display());
    Ok(())
}

fn write_to<W: Write>(table: &Table, writer: W, format: FileFormat, path: &Path) -> UtilResult<W> {
    let write_error = |message: String| UtilError::FileError {
        path: path.to_path_buf(),
        message,
    };

    match format {
        FileFormat::Csv | FileFormat::Tsv => {
            let mut csv_writer = csv::WriterBuilder::new()
                .delimiter(format.default_delimiter())
                .from_writer(writer);
            csv_writer.write_record(table.columns()).map_err(|e| write_error(e.to_string()))?;
            for row in table.rows() {
                csv_writer
                    .write_record(row.iter().map(ToString::to_string))
                    .map_err(|e| write_error(e.to_string()))?;
            }
            csv_writer.into_inner().map_err(|e| write_error(e.to_string()))
        }
        FileFormat::JsonLines => {
            let mut writer = writer;
            for row in table.rows() {
                let record: serde_json::Map<String, serde_json::Value> = table
                    .columns()
                    .iter()
                    .zip(row)
                    .map(|(c, cell)| {
                        let value = serde_json::to_value(cell)
                            .map_err(|e| UtilError::SerializationError(e.to_string()))?;
                        Ok((c.clone(), value))
                    })
                    .collect::<UtilResult<_>>()?;
                serde_json::to_writer(&mut writer, &record)
                    .map_err(|e| UtilError::SerializationError(e.to_string()))?;
                writer.write_all(b"\n").map_err(|e| write_error(e.to_string()))?;
            }
            Ok(writer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            ["id", "value", "label"],
            vec![
                vec![Cell::Number(1.0), Cell::Number(0.125), Cell::from("a")],
                vec![Cell::Number(2.0), Cell::Empty, Cell::from("b")],
            ],
        ).unwrap()
    }

    #[test]
    fn test_infer_format() {
        assert_eq!(FileFormat::infer(Path::new("ppf_1.csv.gz")), (FileFormat::Csv, Compression::Gzip));
        assert_eq!(FileFormat::infer(Path::new("x.TSV")), (FileFormat::Tsv, Compression::None));
        assert_eq!(FileFormat::infer(Path::new("x.jsonl.gz")), (FileFormat::JsonLines, Compression::Gzip));
        assert_eq!(FileFormat::infer(Path::new("noext")), (FileFormat::Csv, Compression::None));
    }

    #[test]
    fn test_gzip_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.csv.gz");
        write_table(&sample(), &path, &WriteOptions::default()).unwrap();

        let table = read_table(&path, &ReadOptions::default()).unwrap();
        assert_eq!(table, sample());
    }

    #[test]
    fn test_tsv_and_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["sample.tsv", "sample.jsonl"] {
            let path = dir.path().join(name);
            write_table(&sample(), &path, &WriteOptions::default()).unwrap();
            let table = read_table(&path, &ReadOptions::default()).unwrap();
            assert_eq!(table.n_rows(), 2);
            assert_eq!(table.numeric_sum(), 3.125);
        }
    }

    #[test]
    fn test_headerless_csv_gets_positional_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, "1,2\n3,4\n").unwrap();

        let options = ReadOptions { has_headers: false, ..ReadOptions::default() };
        let table = read_table(&path, &options).unwrap();
        assert_eq!(table.columns(), &["0", "1"]);
        assert_eq!(table.n_rows(), 2);
    }

    #[test]
    fn test_compression_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packed.dat");
        let options = WriteOptions { compression: Some(Compression::Gzip), format: None };
        write_table(&sample(), &path, &options).unwrap();

        assert!(read_table(&path, &ReadOptions::default()).is_err());
        let table = read_table(&path, &ReadOptions::default().with_compression(Compression::Gzip)).unwrap();
        assert_eq!(table.n_rows(), 2);
    }

    #[test]
    fn test_ragged_rows_are_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a,b\n1,2\n3\n").unwrap();

        let err = read_table(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, UtilError::ParseError { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = read_table(Path::new("/nonexistent/file.csv"), &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, UtilError::FileError { .. }));
    }
}
