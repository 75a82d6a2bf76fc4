//! Avro record encoding
//!
//! Extracted values are always text. Before serializing, each value is
//! coerced to its field's declared type; every field that fails is reported
//! in one [`EncodingError::InvalidFields`] so a bad row can be diagnosed from
//! a single log line.

use apache_avro::types::Value;
use std::sync::Arc;

use crate::error::{EncodingError, FieldDiagnostic};
use crate::extract::Record;
use crate::schema::{FieldSpec, FieldType, ProducerSchema};

/// Turns a record into one message payload
pub trait RecordEncoder: Send + Sync {
    fn encode(&self, record: &Record) -> Result<Vec<u8>, EncodingError>;
}

/// Writes records as raw Avro binary datums (no container header)
#[derive(Debug, Clone)]
pub struct AvroEncoder {
    schema: Arc<ProducerSchema>,
}

impl AvroEncoder {
    pub fn new(schema: Arc<ProducerSchema>) -> Self {
        Self { schema }
    }

    /// Coerce every field, collecting all mismatches
    pub fn to_value(&self, record: &Record) -> Result<Value, EncodingError> {
        let mut fields = Vec::with_capacity(self.schema.fields().len());
        let mut diagnostics = Vec::new();

        for spec in self.schema.fields() {
            let raw = record.get(&spec.key).and_then(Option::as_deref);
            match coerce_field(spec, raw) {
                Ok(value) => fields.push((spec.name.clone(), value)),
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        if diagnostics.is_empty() {
            Ok(Value::Record(fields))
        } else {
            Err(EncodingError::InvalidFields(diagnostics))
        }
    }
}

impl RecordEncoder for AvroEncoder {
    fn encode(&self, record: &Record) -> Result<Vec<u8>, EncodingError> {
        let value = self.to_value(record)?;
        apache_avro::to_avro_datum(self.schema.avro(), value)
            .map_err(|e| EncodingError::Serialize(e.to_string()))
    }
}

fn coerce_field(spec: &FieldSpec, raw: Option<&str>) -> Result<Value, FieldDiagnostic> {
    let diagnostic = |reason: &str| FieldDiagnostic {
        field: spec.name.clone(),
        expected: match spec.union {
            Some(_) => format!("{} or null", spec.field_type),
            None => spec.field_type.to_string(),
        },
        found: raw.map(str::to_string),
        reason: reason.to_string(),
    };

    let Some(text) = raw else {
        return match (spec.union, spec.field_type) {
            (Some(branches), _) => Ok(Value::Union(branches.null, Box::new(Value::Null))),
            (None, FieldType::Null) => Ok(Value::Null),
            (None, _) => Err(diagnostic("field is not nullable")),
        };
    };

    let value = coerce_text(spec.field_type, text).map_err(|reason| diagnostic(&reason))?;
    Ok(match spec.union {
        Some(branches) => Value::Union(branches.value, Box::new(value)),
        None => value,
    })
}

/// Convert raw cell text to a value of `field_type`
pub fn coerce_text(field_type: FieldType, text: &str) -> Result<Value, String> {
    let trimmed = text.trim();
    match field_type {
        FieldType::String => Ok(Value::String(text.to_string())),
        FieldType::Bytes => Ok(Value::Bytes(text.as_bytes().to_vec())),
        FieldType::Int => trimmed
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|e| format!("not a 32-bit integer: {e}")),
        FieldType::Long => trimmed
            .parse::<i64>()
            .map(Value::Long)
            .map_err(|e| format!("not a 64-bit integer: {e}")),
        FieldType::Float => trimmed
            .parse::<f32>()
            .map(Value::Float)
            .map_err(|e| format!("not a number: {e}")),
        FieldType::Double => trimmed
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|e| format!("not a number: {e}")),
        FieldType::Boolean => match trimmed.to_lowercase().as_str() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err("not a boolean".to_string()),
        },
        FieldType::Null => Err("only null is allowed".to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::tests::SAMPLE;

    fn encoder() -> AvroEncoder {
        AvroEncoder::new(Arc::new(ProducerSchema::parse(SAMPLE).unwrap()))
    }

    fn record(pairs: &[(&str, Option<&str>)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    fn valid() -> Record {
        record(&[
            ("ano", Some("2024")),
            ("trimestre", Some("1º")),
            ("instituicao_financeira", Some("BANCO X")),
            ("quantidade_total_de_reclamacoes", Some(" 42 ")),
            ("indice", None),
        ])
    }

    #[test]
    fn encodes_and_decodes_back() {
        let encoder = encoder();
        let bytes = encoder.encode(&valid()).unwrap();

        let schema = ProducerSchema::parse(SAMPLE).unwrap();
        let decoded = apache_avro::from_avro_datum(schema.avro(), &mut bytes.as_slice(), None).unwrap();
        let Value::Record(fields) = decoded else {
            panic!("expected a record, got {decoded:?}");
        };

        assert_eq!(fields[0], ("ano".to_string(), Value::Int(2024)));
        assert_eq!(
            fields[3],
            (
                "quantidade_total_de_reclamacoes".to_string(),
                Value::Union(1, Box::new(Value::Long(42)))
            )
        );
        assert_eq!(fields[4], ("Indice".to_string(), Value::Union(1, Box::new(Value::Null))));
    }

    #[test]
    fn reports_every_bad_field() {
        let mut bad = valid();
        bad.insert("ano".to_string(), Some("dois mil".to_string()));
        bad.insert("instituicao_financeira".to_string(), None);
        bad.insert("indice".to_string(), Some("1,5".to_string()));

        let err = encoder().encode(&bad).unwrap_err();
        let fields: Vec<_> = err.diagnostics().iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, ["ano", "instituicao_financeira", "Indice"]);

        let ano = &err.diagnostics()[0];
        assert_eq!(ano.expected, "int");
        assert_eq!(ano.found.as_deref(), Some("dois mil"));
        assert!(err.to_string().contains("instituicao_financeira: expected string, found null"));
    }

    #[test]
    fn absent_key_counts_as_null() {
        let mut partial = valid();
        partial.remove("trimestre");
        assert!(encoder().encode(&partial).is_ok());

        partial.remove("ano");
        let err = encoder().encode(&partial).unwrap_err();
        assert_eq!(err.diagnostics().len(), 1);
    }

    #[test]
    fn int_range_is_checked() {
        assert!(coerce_text(FieldType::Int, "2147483648").is_err());
        assert_eq!(coerce_text(FieldType::Long, "2147483648").unwrap(), Value::Long(2147483648));
    }

    #[test]
    fn booleans() {
        assert_eq!(coerce_text(FieldType::Boolean, "TRUE").unwrap(), Value::Boolean(true));
        assert_eq!(coerce_text(FieldType::Boolean, "0").unwrap(), Value::Boolean(false));
        assert!(coerce_text(FieldType::Boolean, "sim").is_err());
    }

    #[test]
    fn strings_are_not_trimmed() {
        assert_eq!(coerce_text(FieldType::String, " a ").unwrap(), Value::String(" a ".to_string()));
    }
}
