//! Decoding of user-uploaded spreadsheets into a raw string table.
//!
//! CSV payloads have no declared encoding or separator, so every
//! encoding × separator pair is tried until one yields a real table.
//! Excel workbooks are read from their first worksheet.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file was provided")]
    MissingFile,
    #[error("the file is empty")]
    EmptyFile,
    #[error("unsupported file format '{0}': use CSV or Excel (.xlsx, .xls)")]
    UnsupportedFormat(String),
    #[error("could not read the file with any supported encoding or separator")]
    Unreadable,
    #[error("could not read the workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("the workbook has no readable rows")]
    EmptyWorkbook,
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Excel,
}

impl FileFormat {
    /// Gate on the file extension; anything but `.csv`, `.xlsx`, `.xls` is rejected.
    pub fn from_file_name(name: &str) -> Result<Self, UploadError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" | "xls" => Ok(FileFormat::Excel),
            _ => Err(UploadError::UnsupportedFormat(name.to_string())),
        }
    }
}

/// Header row plus string cells; every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(mut headers: Vec<String>, mut rows: Vec<Vec<String>>) -> Self {
        align_row_lengths(&mut headers, &mut rows);
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[idx].as_str())
    }

    /// Appends a column, replacing any existing column with the same name.
    pub fn push_column(&mut self, name: &str, values: Vec<String>) {
        if let Some(idx) = self.column_index(name) {
            for (row, value) in self.rows.iter_mut().zip(values) {
                row[idx] = value;
            }
            return;
        }
        self.headers.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }
}

fn align_row_lengths(headers: &mut Vec<String>, rows: &mut [Vec<String>]) {
    let column_count = rows.iter().map(Vec::len).max().unwrap_or(0).max(headers.len());
    if headers.len() < column_count {
        let start = headers.len();
        headers.extend((start..column_count).map(|i| format!("Unnamed: {i}")));
    }
    for row in rows.iter_mut() {
        row.resize(column_count, String::new());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextEncoding {
    Utf8Sig,
    Utf8,
    Latin1,
    Windows1252,
    Iso8859_15,
}

/// Tried in order; each single-byte decoder rejects bytes it cannot place,
/// and Latin-1 accepts anything.
const ENCODINGS: [TextEncoding; 5] = [
    TextEncoding::Utf8Sig,
    TextEncoding::Utf8,
    TextEncoding::Iso8859_15,
    TextEncoding::Windows1252,
    TextEncoding::Latin1,
];

const SEPARATORS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Windows-1252 code points for 0x80..=0x9F; `None` marks undefined bytes.
const WINDOWS_1252_HIGH: [Option<char>; 32] = [
    Some('€'), None, Some('‚'), Some('ƒ'), Some('„'), Some('…'), Some('†'), Some('‡'),
    Some('ˆ'), Some('‰'), Some('Š'), Some('‹'), Some('Œ'), None, Some('Ž'), None,
    None, Some('‘'), Some('’'), Some('“'), Some('”'), Some('•'), Some('–'), Some('—'),
    Some('˜'), Some('™'), Some('š'), Some('›'), Some('œ'), None, Some('ž'), Some('Ÿ'),
];

fn iso8859_15(b: u8) -> char {
    match b {
        0xA4 => '€',
        0xA6 => 'Š',
        0xA8 => 'š',
        0xB4 => 'Ž',
        0xB8 => 'ž',
        0xBC => 'Œ',
        0xBD => 'œ',
        0xBE => 'Ÿ',
        _ => char::from(b),
    }
}

impl TextEncoding {
    fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8Sig => {
                let body = bytes.strip_prefix(b"\xEF\xBB\xBF")?;
                std::str::from_utf8(body).ok().map(str::to_string)
            }
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            TextEncoding::Latin1 => Some(bytes.iter().map(|b| char::from(*b)).collect()),
            TextEncoding::Windows1252 => bytes
                .iter()
                .map(|b| match b {
                    0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(b - 0x80)],
                    _ => Some(char::from(*b)),
                })
                .collect(),
            // C1 control bytes never appear in ISO-8859-15 text.
            TextEncoding::Iso8859_15 => bytes
                .iter()
                .map(|b| (!(0x80..=0x9F).contains(b)).then(|| iso8859_15(*b)))
                .collect(),
        }
    }
}

fn parse_delimited(text: &str, delimiter: u8) -> Option<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .ok()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.ok()?;
        let values: Vec<String> = record.iter().map(|v| v.trim().to_string()).collect();
        if values.iter().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(values);
    }

    if headers.len() > 1 && !rows.is_empty() {
        Some(RawTable::new(headers, rows))
    } else {
        None
    }
}

pub fn read_csv_bytes(bytes: &[u8]) -> Result<RawTable, UploadError> {
    for encoding in ENCODINGS {
        let Some(text) = encoding.decode(bytes) else {
            debug!(?encoding, "decode failed");
            continue;
        };
        for delimiter in SEPARATORS {
            if let Some(table) = parse_delimited(&text, delimiter) {
                debug!(?encoding, delimiter = %char::from(delimiter).escape_default(), "parsed CSV upload");
                return Ok(table);
            }
        }
    }
    Err(UploadError::Unreadable)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => dt.to_string(),
        },
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR({:?})", e),
    }
}

pub fn read_excel_bytes(bytes: &[u8]) -> Result<RawTable, UploadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(UploadError::EmptyWorkbook)?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .ok_or(UploadError::EmptyWorkbook)?
        .iter()
        .map(cell_to_string)
        .collect();

    let rows: Vec<Vec<String>> = rows_iter
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
        .filter(|values| values.iter().any(|v| !v.is_empty()))
        .collect();

    if rows.is_empty() {
        return Err(UploadError::EmptyWorkbook);
    }
    Ok(RawTable::new(headers, rows))
}

/// Decode an upload according to its file name.
pub fn read_table(file_name: &str, bytes: &[u8]) -> Result<RawTable, UploadError> {
    let format = FileFormat::from_file_name(file_name)?;
    if bytes.is_empty() {
        return Err(UploadError::EmptyFile);
    }
    match format {
        FileFormat::Csv => read_csv_bytes(bytes),
        FileFormat::Excel => read_excel_bytes(bytes),
    }
}

/// Keep only characters that are safe in a file name.
fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

/// Persist the raw upload as `<id>_<name>` inside `dir`.
pub fn save_upload(dir: &Path, id: &str, file_name: &str, bytes: &[u8]) -> Result<PathBuf, UploadError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}_{}", id, sanitize_file_name(file_name)));
    std::fs::write(&path, bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "stored upload");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_gate() {
        assert_eq!(FileFormat::from_file_name("datos.CSV").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_file_name("libro.xlsx").unwrap(), FileFormat::Excel);
        assert_eq!(FileFormat::from_file_name("viejo.xls").unwrap(), FileFormat::Excel);
        assert!(matches!(
            FileFormat::from_file_name("notas.txt"),
            Err(UploadError::UnsupportedFormat(_))
        ));
        assert!(FileFormat::from_file_name("sin_extension").is_err());
    }

    #[test]
    fn test_semicolon_separated() {
        let table = read_csv_bytes(b"ID;Ciudad;Comentario\n1;Cali;Robo en el parque\n2;Pasto;Todo bien\n").unwrap();
        assert_eq!(table.headers, vec!["ID", "Ciudad", "Comentario"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][2], "Robo en el parque");
    }

    fn single_byte_csv(city: &[u8]) -> Vec<u8> {
        let mut bytes = b"ID,Ciudad\n1,".to_vec();
        bytes.extend_from_slice(city);
        bytes.push(b'\n');
        bytes
    }

    #[test]
    fn test_single_byte_fallback() {
        // "Bogotá" in a single-byte encoding is invalid UTF-8.
        let table = read_csv_bytes(&single_byte_csv(b"Bogot\xE1")).unwrap();
        assert_eq!(table.rows[0][1], "Bogotá");
    }

    #[test]
    fn test_iso8859_15_euro_sign() {
        let table = read_csv_bytes(&single_byte_csv(b"\xA4 100")).unwrap();
        assert_eq!(table.rows[0][1], "€ 100");
    }

    #[test]
    fn test_windows_1252_smart_quotes() {
        let table = read_csv_bytes(&single_byte_csv(b"\x93Cali\x94 \x80")).unwrap();
        assert_eq!(table.rows[0][1], "“Cali” €");
    }

    #[test]
    fn test_latin1_accepts_undefined_bytes() {
        // 0x81 is undefined in Windows-1252 and a C1 control in ISO-8859-15.
        let table = read_csv_bytes(&single_byte_csv(b"Ibagu\xE9\x81")).unwrap();
        assert_eq!(table.rows[0][1], "Ibagué\u{81}");
    }

    #[test]
    fn test_bom_is_stripped() {
        let table = read_csv_bytes("\u{feff}ID,Ciudad\n1,Cali\n".as_bytes()).unwrap();
        assert_eq!(table.headers[0], "ID");
    }

    #[test]
    fn test_single_column_is_unreadable() {
        assert!(matches!(read_csv_bytes(b"solo\nuno\ndos\n"), Err(UploadError::Unreadable)));
        assert!(matches!(read_csv_bytes(b"a,b\n"), Err(UploadError::Unreadable)));
    }

    #[test]
    fn test_ragged_rows_are_aligned() {
        let table = RawTable::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into()], vec!["1".into(), "2".into(), "3".into()]],
        );
        assert_eq!(table.headers.len(), 3);
        assert!(table.rows.iter().all(|r| r.len() == 3));
    }

    #[test]
    fn test_push_column_replaces_existing() {
        let mut table = RawTable::new(vec!["a".into(), "b".into()], vec![vec!["1".into(), "2".into()]]);
        table.push_column("c", vec!["x".into()]);
        table.push_column("c", vec!["y".into()]);
        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.rows[0], vec!["1", "2", "y"]);
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(read_table("vacio.csv", b""), Err(UploadError::EmptyFile)));
        assert!(matches!(read_table("x.pdf", b"data"), Err(UploadError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_save_upload_sanitizes_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_upload(dir.path(), "abc", "../mis datos.csv", b"a,b\n1,2\n").unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "abc_mis_datos.csv");
        assert_eq!(std::fs::read(&path).unwrap(), b"a,b\n1,2\n");
    }
}
