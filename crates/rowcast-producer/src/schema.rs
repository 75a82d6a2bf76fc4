//! Record schema
//!
//! The producer's output contract is one Avro record schema, read from an
//! `.avsc` file at startup and never reloaded. Fields must be primitives, or
//! a union of `null` and exactly one primitive (a nullable primitive).

use apache_avro::schema::{RecordSchema, Schema};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use crate::error::SchemaError;

/// Lower-cased names of the schema's fields
pub type FieldSet = BTreeSet<String>;

/// Primitive Avro type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
}

impl FieldType {
    fn from_avro(schema: &Schema) -> Option<Self> {
        match schema {
            Schema::Null => Some(FieldType::Null),
            Schema::Boolean => Some(FieldType::Boolean),
            Schema::Int => Some(FieldType::Int),
            Schema::Long => Some(FieldType::Long),
            Schema::Float => Some(FieldType::Float),
            Schema::Double => Some(FieldType::Double),
            Schema::String => Some(FieldType::String),
            Schema::Bytes => Some(FieldType::Bytes),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Null => "null",
            FieldType::Boolean => "boolean",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
        };
        f.write_str(name)
    }
}

/// Union branch positions of a nullable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnionBranches {
    pub null: u32,
    pub value: u32,
}

/// One schema field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Name as declared in the schema
    pub name: String,
    /// Record key the field is looked up by
    pub key: String,
    pub field_type: FieldType,
    /// Set when the field is declared as `["null", <type>]` (either order)
    pub union: Option<UnionBranches>,
}

impl FieldSpec {
    pub fn nullable(&self) -> bool {
        self.union.is_some() || self.field_type == FieldType::Null
    }

    fn from_avro(name: &str, schema: &Schema) -> Result<Self, SchemaError> {
        let unsupported = |reason: String| SchemaError::UnsupportedField {
            field: name.to_string(),
            reason,
        };

        let (field_type, union) = match schema {
            Schema::Union(union) => {
                let variants = union.variants();
                let null = variants.iter().position(|v| matches!(v, Schema::Null));
                let values: Vec<_> = variants
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| !matches!(v, Schema::Null))
                    .collect();

                match (null, values.as_slice()) {
                    (Some(null), [(value, inner)]) => {
                        let field_type = FieldType::from_avro(inner).ok_or_else(|| {
                            unsupported(format!("union branch {inner:?} is not a primitive"))
                        })?;
                        let branches = UnionBranches {
                            null: null as u32,
                            value: *value as u32,
                        };
                        (field_type, Some(branches))
                    },
                    _ => {
                        return Err(unsupported(
                            "only unions of null and one primitive are supported".to_string(),
                        ))
                    },
                }
            },
            other => {
                let field_type = FieldType::from_avro(other)
                    .ok_or_else(|| unsupported(format!("{other:?} is not a primitive")))?;
                (field_type, None)
            },
        };

        Ok(Self {
            name: name.to_string(),
            key: name.to_lowercase(),
            field_type,
            union,
        })
    }
}

/// A parsed record schema plus the field metadata the pipeline needs
#[derive(Debug, Clone)]
pub struct ProducerSchema {
    avro: Schema,
    name: String,
    fields: Vec<FieldSpec>,
    field_set: FieldSet,
}

impl ProducerSchema {
    /// Read and parse an `.avsc` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse schema JSON text
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let avro = Schema::parse_str(text).map_err(|e| SchemaError::Parse(e.to_string()))?;

        let (name, fields) = match &avro {
            Schema::Record(RecordSchema { name, fields, .. }) => {
                let fields = fields
                    .iter()
                    .map(|field| FieldSpec::from_avro(&field.name, &field.schema))
                    .collect::<Result<Vec<_>, _>>()?;
                (name.fullname(None), fields)
            },
            other => return Err(SchemaError::NotARecord(format!("{other:?}"))),
        };

        let field_set = fields.iter().map(|f| f.key.clone()).collect();

        Ok(Self {
            avro,
            name,
            fields,
            field_set,
        })
    }

    /// Full record name, e.g. `br.gov.bcb.Reclamacao`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn avro(&self) -> &Schema {
        &self.avro
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_set(&self) -> &FieldSet {
        &self.field_set
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "type": "record",
        "name": "Reclamacao",
        "namespace": "br.gov.bcb",
        "fields": [
            {"name": "ano", "type": "int"},
            {"name": "trimestre", "type": ["null", "string"], "default": null},
            {"name": "instituicao_financeira", "type": "string"},
            {"name": "quantidade_total_de_reclamacoes", "type": ["null", "long"], "default": null},
            {"name": "Indice", "type": ["double", "null"]}
        ]
    }"#;

    #[test]
    fn parses_fields_in_order() {
        let schema = ProducerSchema::parse(SAMPLE).unwrap();
        assert_eq!(schema.name(), "br.gov.bcb.Reclamacao");

        let names: Vec<_> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            ["ano", "trimestre", "instituicao_financeira", "quantidade_total_de_reclamacoes", "Indice"]
        );

        let ano = &schema.fields()[0];
        assert_eq!(ano.field_type, FieldType::Int);
        assert!(!ano.nullable());

        let trimestre = &schema.fields()[1];
        assert_eq!(trimestre.union, Some(UnionBranches { null: 0, value: 1 }));

        let indice = &schema.fields()[4];
        assert_eq!(indice.field_type, FieldType::Double);
        assert_eq!(indice.union, Some(UnionBranches { null: 1, value: 0 }));
    }

    #[test]
    fn field_set_is_lower_case() {
        let schema = ProducerSchema::parse(SAMPLE).unwrap();
        assert!(schema.field_set().contains("indice"));
        assert!(!schema.field_set().contains("Indice"));
        assert_eq!(schema.field_set().len(), 5);
    }

    #[test]
    fn rejects_non_record() {
        let err = ProducerSchema::parse(r#""string""#).unwrap_err();
        assert!(matches!(err, SchemaError::NotARecord(_)));
    }

    #[test]
    fn rejects_wide_unions() {
        let text = r#"{"type": "record", "name": "R", "fields": [
            {"name": "v", "type": ["null", "int", "string"]}
        ]}"#;
        let err = ProducerSchema::parse(text).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedField { ref field, .. } if field == "v"));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(ProducerSchema::parse("{not json"), Err(SchemaError::Parse(_))));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = ProducerSchema::from_file("/nonexistent/schema.avsc").unwrap_err();
        assert!(matches!(err, SchemaError::Read { .. }));
    }
}
