//! Declarative field tables
//!
//! A [`FieldDescriptor`] binds a domain attribute name to its wire property,
//! an optional distinct query-parameter name, and the read/write value
//! transformations. Descriptors are grouped into an [`EntitySchema`], built
//! once at startup and shared read-only by every entity of the type.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::ExtractError;
use crate::timestamps::{self, EpochUnit};
use crate::value::FieldValue;

/// Wire-value to domain-value conversion applied on read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// Keep the wire value as-is
    Identity,
    /// Parse the `/Date(<millis>)/` envelope into a UTC instant
    OdataTimestamp,
    /// Parse an ISO-8601-ish string into a UTC instant
    StringTimestamp,
}

impl Extractor {
    pub fn extract(&self, raw: &serde_json::Value) -> Result<FieldValue, ExtractError> {
        match self {
            Extractor::Identity => Ok(FieldValue::from_json(raw)),
            Extractor::OdataTimestamp => {
                let text = expect_str(raw)?;
                let instant = timestamps::parse_odata_timestamp(text, EpochUnit::Milliseconds)?;
                Ok(FieldValue::Timestamp(instant))
            }
            Extractor::StringTimestamp => {
                let text = expect_str(raw)?;
                let instant = timestamps::parse_string_timestamp(text, None)?;
                Ok(FieldValue::Timestamp(instant))
            }
        }
    }
}

fn expect_str(raw: &serde_json::Value) -> Result<&str, ExtractError> {
    raw.as_str().ok_or_else(|| ExtractError::NotAString {
        found: raw.to_string(),
    })
}

/// A literal value usable in a compiled filter clause
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Rendered verbatim; callers quote string literals themselves (`"'Type A'"`)
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl QueryValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            QueryValue::Int(i) => Some(*i as f64),
            QueryValue::Float(f) => Some(*f),
            QueryValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::Str(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::Str(s)
    }
}

impl From<i64> for QueryValue {
    fn from(i: i64) -> Self {
        QueryValue::Int(i)
    }
}

impl From<i32> for QueryValue {
    fn from(i: i32) -> Self {
        QueryValue::Int(i as i64)
    }
}

impl From<f64> for QueryValue {
    fn from(f: f64) -> Self {
        QueryValue::Float(f)
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        QueryValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(t: DateTime<Utc>) -> Self {
        QueryValue::Timestamp(t)
    }
}

/// Domain-value to wire-comparable-literal transformation applied when
/// building filter clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTransform {
    /// Render the value as given
    Identity,
    /// Force a floating-point literal (`10` becomes `10.0`); the service
    /// compares some numeric columns as Edm.Double
    Double,
    /// Wrap as `datetimeoffset'<iso>'`
    DatetimeOffset,
}

impl QueryTransform {
    pub fn apply(&self, value: &QueryValue) -> String {
        match self {
            QueryTransform::Identity => render_identity(value),
            QueryTransform::Double => match value.as_f64() {
                Some(f) => format!("{:?}", f),
                None => render_identity(value),
            },
            QueryTransform::DatetimeOffset => {
                let instant = match value {
                    QueryValue::Timestamp(t) => Some(*t),
                    QueryValue::Str(s) => timestamps::parse_string_timestamp(s, None).ok(),
                    _ => None,
                };
                match instant {
                    Some(t) => {
                        format!("datetimeoffset'{}'", timestamps::instant_to_iso(&t, false))
                    }
                    None => render_identity(value),
                }
            }
        }
    }
}

fn render_identity(value: &QueryValue) -> String {
    match value {
        QueryValue::Str(s) => s.clone(),
        QueryValue::Int(i) => i.to_string(),
        QueryValue::Float(f) => format!("{:?}", f),
        QueryValue::Bool(b) => b.to_string(),
        QueryValue::Timestamp(t) => timestamps::instant_to_iso(t, false),
    }
}

/// Immutable metadata binding one domain attribute to one wire property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    attribute_name: &'static str,
    wire_name: &'static str,
    query_name: Option<&'static str>,
    mandatory: bool,
    exposed: bool,
    extractor: Extractor,
    query_transformer: QueryTransform,
}

impl FieldDescriptor {
    /// New optional, exposed field with identity conversions
    pub const fn new(attribute_name: &'static str, wire_name: &'static str) -> Self {
        Self {
            attribute_name,
            wire_name,
            query_name: None,
            mandatory: false,
            exposed: true,
            extractor: Extractor::Identity,
            query_transformer: QueryTransform::Identity,
        }
    }

    /// Use a distinct parameter name when building filter clauses
    pub const fn with_query_name(mut self, query_name: &'static str) -> Self {
        self.query_name = Some(query_name);
        self
    }

    pub const fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub const fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub const fn with_query_transformer(mut self, query_transformer: QueryTransform) -> Self {
        self.query_transformer = query_transformer;
        self
    }

    pub fn attribute_name(&self) -> &'static str {
        self.attribute_name
    }

    pub fn wire_name(&self) -> &'static str {
        self.wire_name
    }

    /// The name used in filter clauses; defaults to the wire name
    pub fn query_name(&self) -> &'static str {
        self.query_name.unwrap_or(self.wire_name)
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Whether the attribute appears in default column/attribute listings
    ///
    /// Attributes whose name begins with `_` are internal and never exposed,
    /// regardless of the declared flag.
    pub fn is_exposed(&self) -> bool {
        self.exposed && !self.attribute_name.starts_with('_')
    }

    pub fn extractor(&self) -> Extractor {
        self.extractor
    }

    pub fn query_transformer(&self) -> QueryTransform {
        self.query_transformer
    }
}

/// Field-descriptor registry for one concrete entity type
#[derive(Debug)]
pub struct EntitySchema {
    name: &'static str,
    fields: Vec<FieldDescriptor>,
    by_attribute: HashMap<&'static str, usize>,
    by_wire: HashMap<&'static str, usize>,
    id_attribute: &'static str,
    type_attribute: &'static str,
}

impl EntitySchema {
    /// Build a schema; panics on duplicate attribute names or an `id`/`type`
    /// attribute that is not in the field table (startup-time programming error)
    pub fn new(
        name: &'static str,
        id_attribute: &'static str,
        type_attribute: &'static str,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        let mut by_attribute = HashMap::with_capacity(fields.len());
        let mut by_wire = HashMap::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            let previous = by_attribute.insert(field.attribute_name, index);
            assert!(
                previous.is_none(),
                "duplicate attribute '{}' in schema '{}'",
                field.attribute_name,
                name
            );
            by_wire.insert(field.wire_name, index);
        }
        assert!(
            by_attribute.contains_key(id_attribute),
            "id attribute '{}' not declared in schema '{}'",
            id_attribute,
            name
        );
        assert!(
            by_attribute.contains_key(type_attribute),
            "type attribute '{}' not declared in schema '{}'",
            type_attribute,
            name
        );
        Self {
            name,
            fields,
            by_attribute,
            by_wire,
            id_attribute,
            type_attribute,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, attribute: &str) -> Option<&FieldDescriptor> {
        self.by_attribute.get(attribute).map(|&i| &self.fields[i])
    }

    pub fn field_by_wire(&self, wire_name: &str) -> Option<&FieldDescriptor> {
        self.by_wire.get(wire_name).map(|&i| &self.fields[i])
    }

    /// Attribute names included in default column listings, in declaration order
    pub fn exposed_attributes(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.is_exposed())
            .map(|f| f.attribute_name())
            .collect()
    }

    /// The identifying attribute (entity equality, create verification, joins)
    pub fn id_attribute(&self) -> &'static str {
        self.id_attribute
    }

    /// The type-discriminator attribute (custom-property union precondition)
    pub fn type_attribute(&self) -> &'static str {
        self.type_attribute
    }

    pub fn id_field(&self) -> &FieldDescriptor {
        self.field(self.id_attribute)
            .expect("id attribute checked at construction")
    }
}
