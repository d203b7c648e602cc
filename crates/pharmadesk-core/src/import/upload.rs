//! Upload decoding: CSV bytes to raw rows.

use sha2::{Digest, Sha256};
use thiserror::Error;

use super::normalizer::RawRow;

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Upload decoding errors.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload is empty")]
    Empty,

    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Please upload a CSV file (got '{0}')")]
    NotCsv(String),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
}

/// A decoded upload.
#[derive(Debug, Clone)]
pub struct DecodedUpload {
    /// Non-blank data rows in file order
    pub rows: Vec<RawRow>,
    /// Rows dropped because every cell was blank
    pub blank_rows: usize,
    /// Hex SHA-256 of the raw bytes
    pub sha256: String,
}

/// Reject file names that are not `.csv`.
pub fn ensure_csv_filename(file_name: &str) -> Result<(), UploadError> {
    if file_name.to_lowercase().ends_with(".csv") {
        Ok(())
    } else {
        Err(UploadError::NotCsv(file_name.to_string()))
    }
}

/// Hex SHA-256 of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Decode uploaded CSV bytes into raw rows.
///
/// The first record is the header row. Text is read as UTF-8 (BOM
/// stripped), falling back to Latin-1 when the bytes are not valid UTF-8.
/// Short records are padded with empty cells; all-blank rows are dropped.
pub fn decode_upload(data: &[u8], max_bytes: usize) -> Result<DecodedUpload, UploadError> {
    if data.is_empty() {
        return Err(UploadError::Empty);
    }
    if data.len() > max_bytes {
        return Err(UploadError::TooLarge {
            size: data.len(),
            limit: max_bytes,
        });
    }

    let sha256 = sha256_hex(data);
    let text = decode_text(strip_utf8_bom(data));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    let mut blank_rows = 0;
    for record in reader.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.as_str(), record.get(i).unwrap_or("")))
            .collect();

        if row.is_blank() {
            blank_rows += 1;
        } else {
            rows.push(row);
        }
    }

    Ok(DecodedUpload {
        rows,
        blank_rows,
        sha256,
    })
}

/// Strip UTF-8 BOM from the beginning of data if present.
fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(UTF8_BOM).unwrap_or(data)
}

fn decode_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        // Latin-1 maps each byte to the code point of the same value
        Err(_) => data.iter().map(|&b| b as char).collect(),
    }
}
