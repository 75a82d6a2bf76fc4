//! Row extraction
//!
//! Source files are `;`-delimited text in ISO-8859-1 with a header line.
//! Each data line becomes one [`Record`] holding only the columns whose
//! sanitized header names a schema field.

use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::{debug, instrument};

use crate::error::{ExtractError, StorageError};
use crate::sanitize::field_key;
use crate::schema::FieldSet;
use crate::storage::ObjectStore;

/// Field delimiter of every source file
pub const DELIMITER: u8 = b';';

/// Sanitized field name to raw text; empty cells are `None`
pub type Record = BTreeMap<String, Option<String>>;

/// ISO-8859-1 maps every byte to the code point of the same value
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Lazy, single-pass sequence of records from one file.
///
/// Yields `Err` at most once, after which it is exhausted. Records yielded
/// before the error remain valid.
pub struct RowExtractor {
    key: String,
    rows: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
    /// Record key for each column index, `None` when the column is not in
    /// the schema
    columns: Vec<Option<String>>,
    done: bool,
}

impl std::fmt::Debug for RowExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowExtractor")
            .field("key", &self.key)
            .field("columns", &self.columns)
            .field("done", &self.done)
            .finish()
    }
}

impl RowExtractor {
    /// Download `key` and read its header line
    #[instrument(skip(store, fields))]
    pub async fn open(
        store: &dyn ObjectStore,
        key: &str,
        fields: &FieldSet,
    ) -> Result<Self, ExtractError> {
        let bytes = store.get(key).await.map_err(|source| match source {
            StorageError::NotFound(_) => ExtractError::MissingSource(key.to_string()),
            source => ExtractError::Storage {
                key: key.to_string(),
                source,
            },
        })?;

        debug!(bytes = bytes.len(), "Fetched source object");
        Self::from_bytes(key, &bytes, fields)
    }

    /// Read records from an in-memory file body
    pub fn from_bytes(key: &str, bytes: &[u8], fields: &FieldSet) -> Result<Self, ExtractError> {
        let text = decode_latin1(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_reader(Cursor::new(text.into_bytes()));

        let headers = reader.headers().map_err(|source| ExtractError::Parse {
            key: key.to_string(),
            line: 1,
            source,
        })?;

        let columns: Vec<Option<String>> = headers
            .iter()
            .map(|header| Some(field_key(header)).filter(|k| fields.contains(k)))
            .collect();

        debug!(
            key,
            headers = headers.len(),
            retained = columns.iter().flatten().count(),
            "Parsed header line"
        );

        Ok(Self {
            key: key.to_string(),
            rows: reader.into_records(),
            columns,
            done: false,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record keys this file provides, in column order
    pub fn retained_fields(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().flatten().map(String::as_str)
    }

    fn to_record(&self, row: &csv::StringRecord) -> Record {
        let mut record = Record::new();
        for (index, column) in self.columns.iter().enumerate() {
            let Some(name) = column else { continue };
            let value = row.get(index).filter(|v| !v.is_empty()).map(str::to_string);
            record.insert(name.clone(), value);
        }
        record
    }
}

impl Iterator for RowExtractor {
    type Item = Result<Record, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.rows.next() {
            Some(Ok(row)) => Some(Ok(self.to_record(&row))),
            Some(Err(source)) => {
                self.done = true;
                Some(Err(ExtractError::Parse {
                    key: self.key.clone(),
                    line: source.position().map(|p| p.line()).unwrap_or(0),
                    source,
                }))
            },
            None => {
                self.done = true;
                None
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn fields(names: &[&str]) -> FieldSet {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn extract(text: &[u8], names: &[&str]) -> Vec<Record> {
        RowExtractor::from_bytes("t.csv", text, &fields(names))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn keeps_only_schema_fields() {
        let records = extract(b"Ano;Extra;Trimestre\n2024;x;1\n2023;y;2\n", &["ano", "trimestre"]);

        assert_eq!(records.len(), 2);
        for record in &records {
            assert!(!record.contains_key("extra"));
            assert_eq!(record.len(), 2);
        }
        assert_eq!(records[0]["ano"].as_deref(), Some("2024"));
        assert_eq!(records[1]["trimestre"].as_deref(), Some("2"));
    }

    #[test]
    fn empty_cells_are_null() {
        let records = extract(b"ano;trimestre\n;1\n", &["ano", "trimestre"]);
        assert_eq!(records[0]["ano"], None);
        assert_eq!(records[0]["trimestre"].as_deref(), Some("1"));
    }

    #[test]
    fn short_rows_fill_null_and_long_rows_are_cut() {
        let records = extract(b"ano;trimestre\n2024\n2023;2;surplus\n", &["ano", "trimestre"]);
        assert_eq!(records[0]["trimestre"], None);
        assert_eq!(records[1].len(), 2);
        assert_eq!(records[1]["trimestre"].as_deref(), Some("2"));
    }

    #[test]
    fn decodes_latin1_headers_and_values() {
        // "Instituição financeira" and "São Paulo" in ISO-8859-1
        let mut text = b"Institui\xe7\xe3o financeira\n".to_vec();
        text.extend_from_slice(b"S\xe3o Paulo\n");

        let records = extract(&text, &["instituicao_financeira"]);
        assert_eq!(records[0]["instituicao_financeira"].as_deref(), Some("São Paulo"));
    }

    #[test]
    fn quoted_delimiters_stay_in_value() {
        let records = extract(b"tipo;ano\n\"a;b\";2024\n", &["tipo", "ano"]);
        assert_eq!(records[0]["tipo"].as_deref(), Some("a;b"));
    }

    #[test]
    fn preserves_file_order_and_skips_blank_lines() {
        let records = extract(b"ano\n1\n\n2\n3\n", &["ano"]);
        let values: Vec<_> = records.iter().map(|r| r["ano"].clone().unwrap()).collect();
        assert_eq!(values, ["1", "2", "3"]);
    }

    #[test]
    fn header_only_file_is_empty() {
        assert!(extract(b"ano;trimestre\n", &["ano"]).is_empty());
        assert!(extract(b"", &["ano"]).is_empty());
    }

    #[test]
    fn reports_retained_fields() {
        let extractor =
            RowExtractor::from_bytes("t.csv", b"Extra;ANO\n", &fields(&["ano"])).unwrap();
        assert_eq!(extractor.retained_fields().collect::<Vec<_>>(), ["ano"]);
    }

    #[tokio::test]
    async fn missing_object_is_missing_source() {
        let store = MemoryStore::new();
        let err = RowExtractor::open(&store, "nope.csv", &fields(&["ano"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingSource(ref k) if k == "nope.csv"));
    }

    #[tokio::test]
    async fn opens_from_store() {
        let store = MemoryStore::new();
        store.insert("in/a.csv", "ano\n2024\n");

        let records: Vec<_> = RowExtractor::open(&store, "in/a.csv", &fields(&["ano"]))
            .await
            .unwrap()
            .collect();
        assert_eq!(records.len(), 1);
    }
}
