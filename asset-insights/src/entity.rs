//! Entity materialization and collections
//!
//! An [`Entity`] wraps one raw JSON record and the typed values extracted for
//! every declared field present on the wire. Tenant-defined custom properties
//! (wire keys with a `Z_`/`z_` prefix) are discovered per instance and kept in
//! a side bag, addressable by their raw key. An [`EntitySet`] is an ordered
//! collection of entities of one type with a tabular projection.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::ops::Index;

use crate::error::{AttributeUnavailable, HeterogeneousTypes, MixedElements};
use crate::fields::EntitySchema;
use crate::value::FieldValue;
use crate::warnings::{self, Warning};

/// Wire keys following the tenant custom-field convention: a single-letter
/// `Z`/`z` prefix followed by an underscore
pub fn is_custom_key(key: &str) -> bool {
    key.starts_with("Z_") || key.starts_with("z_")
}

/// One materialized record of a concrete entity type
#[derive(Debug, Clone)]
pub struct Entity {
    schema: &'static EntitySchema,
    raw: serde_json::Map<String, serde_json::Value>,
    values: HashMap<&'static str, FieldValue>,
    custom: BTreeMap<String, FieldValue>,
}

impl Entity {
    /// Materialize a raw record
    ///
    /// Declared fields absent from `raw` leave the attribute unset; declared
    /// values that fail extraction are treated as a data-quality signal (a
    /// warning, the attribute stays unset), not a construction failure. The
    /// custom-property bag is computed here once; entities never mutate.
    pub fn new(schema: &'static EntitySchema, raw: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut values = HashMap::new();
        for field in schema.fields() {
            let Some(wire_value) = raw.get(field.wire_name()) else {
                continue;
            };
            match field.extractor().extract(wire_value) {
                Ok(value) => {
                    values.insert(field.attribute_name(), value);
                }
                Err(e) => warnings::emit(Warning::ExtractionFailed {
                    attribute: field.attribute_name().to_string(),
                    detail: e.to_string(),
                }),
            }
        }
        let custom = raw
            .iter()
            .filter(|(key, _)| is_custom_key(key) && schema.field_by_wire(key).is_none())
            .map(|(key, value)| (key.clone(), FieldValue::from_json(value)))
            .collect();
        Self {
            schema,
            raw,
            values,
            custom,
        }
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    /// The raw record as returned by the service
    pub fn raw(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.raw
    }

    /// Look up an attribute by domain name, or a custom property by raw key
    ///
    /// Fails with [`AttributeUnavailable`] for declared-but-absent fields, so
    /// a missing value is never conflated with a legitimate null.
    pub fn get(&self, attribute: &str) -> Result<&FieldValue, AttributeUnavailable> {
        self.try_get(attribute).ok_or_else(|| AttributeUnavailable {
            attribute: attribute.to_string(),
        })
    }

    /// Like [`Entity::get`], but `None` for anything unset
    pub fn try_get(&self, attribute: &str) -> Option<&FieldValue> {
        self.values
            .get(attribute)
            .or_else(|| self.custom.get(attribute))
    }

    /// The identifier value, when present
    pub fn id(&self) -> Option<&FieldValue> {
        self.try_get(self.schema.id_attribute())
    }

    /// Custom property by its raw wire key
    pub fn get_custom(&self, name: &str) -> Option<&FieldValue> {
        self.custom.get(name)
    }

    /// Raw keys of all custom properties on this record, in key order
    pub fn custom_property_names(&self) -> impl Iterator<Item = &str> {
        self.custom.keys().map(String::as_str)
    }
}

impl std::fmt::Display for Entity {
    /// Short representation: `Alert(id="...")`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.id().map(ToString::to_string).unwrap_or_default();
        write!(f, "{}(id=\"{}\")", self.schema.name(), id)
    }
}

impl PartialEq for Entity {
    /// Equality follows the declared identifier field
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.id() == other.id()
    }
}

/// Ordered collection of entities of one concrete type
#[derive(Debug, Clone)]
pub struct EntitySet {
    schema: &'static EntitySchema,
    elements: Vec<Entity>,
}

impl EntitySet {
    /// Build a set; every element must belong to `schema`
    pub fn new(schema: &'static EntitySchema, elements: Vec<Entity>) -> Result<Self, MixedElements> {
        for element in &elements {
            if !std::ptr::eq(element.schema(), schema) {
                return Err(MixedElements {
                    expected: schema.name(),
                    found: element.schema().name(),
                });
            }
        }
        Ok(Self { schema, elements })
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.elements.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.elements.iter()
    }

    pub fn into_elements(self) -> Vec<Entity> {
        self.elements
    }

    /// Tabular projection
    ///
    /// Default columns are all exposed attributes. The type-discriminator and
    /// identifier columns are always carried during computation (the
    /// custom-property union needs both) and dropped from the result unless
    /// explicitly requested. With `include_all_custom` on a non-empty set, all
    /// elements must share one non-null discriminator value; the union of
    /// every element's custom keys is joined on via the identifier column.
    pub fn as_table(
        &self,
        columns: Option<&[&str]>,
        include_all_custom: bool,
    ) -> Result<Table, HeterogeneousTypes> {
        let exposed = self.schema.exposed_attributes();
        let requested: Vec<String> = match columns {
            Some(columns) => columns.iter().map(|c| c.to_string()).collect(),
            None => exposed.iter().map(|c| c.to_string()).collect(),
        };
        self.warn_unknown_columns(&requested);

        let type_attribute = self.schema.type_attribute();
        let id_attribute = self.schema.id_attribute();
        let type_requested = requested.iter().any(|c| c == type_attribute);
        let id_requested = requested.iter().any(|c| c == id_attribute);
        let mut working = requested;
        if !type_requested {
            working.push(type_attribute.to_string());
        }
        if !working.iter().any(|c| c == id_attribute) {
            working.push(id_attribute.to_string());
        }
        let mut table = self.project(&working);

        if include_all_custom && !self.is_empty() {
            let type_index = table
                .column_index(type_attribute)
                .expect("discriminator column carried during computation");
            let mut distinct: Vec<&FieldValue> = Vec::new();
            for row in &table.rows {
                let value = &row[type_index];
                if value.is_null() {
                    continue;
                }
                if !distinct.contains(&value) {
                    distinct.push(value);
                }
            }
            if distinct.len() > 1 {
                return Err(HeterogeneousTypes {
                    distinct: distinct.len(),
                });
            }

            let mut custom_columns: Vec<String> = Vec::new();
            for element in &self.elements {
                for key in element.custom_property_names() {
                    if !custom_columns.iter().any(|c| c == key) {
                        custom_columns.push(key.to_string());
                    }
                }
            }
            let mut join_columns = custom_columns;
            join_columns.push(id_attribute.to_string());
            let custom_table = self.project(&join_columns);
            table = table.merge_on(&custom_table, id_attribute);
        }

        if !type_requested {
            table.drop_column(type_attribute);
        }
        if !id_requested && id_attribute != type_attribute {
            table.drop_column(id_attribute);
        }
        Ok(table)
    }

    fn project(&self, columns: &[String]) -> Table {
        let rows = self
            .elements
            .iter()
            .map(|element| {
                columns
                    .iter()
                    .map(|column| {
                        element
                            .try_get(column)
                            .cloned()
                            .unwrap_or(FieldValue::Null)
                    })
                    .collect()
            })
            .collect();
        Table {
            columns: columns.to_vec(),
            rows,
        }
    }

    fn warn_unknown_columns(&self, requested: &[String]) {
        let unknown: Vec<String> = requested
            .iter()
            .filter(|column| self.schema.field(column).is_none() && !is_custom_key(column))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            warnings::emit(Warning::UnknownAttributes { names: unknown });
        }
    }
}

impl Index<usize> for EntitySet {
    type Output = Entity;

    fn index(&self, index: usize) -> &Entity {
        &self.elements[index]
    }
}

impl PartialEq for EntitySet {
    /// Same type, same-length sequence of equal elements in order
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.elements == other.elements
    }
}

impl<'a> IntoIterator for &'a EntitySet {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl IntoIterator for EntitySet {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

/// A simple column-ordered table of field values
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<FieldValue>>,
}

impl Table {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&FieldValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Left join: append `other`'s non-shared columns, matching rows on `key`
    fn merge_on(mut self, other: &Table, key: &str) -> Table {
        let self_key = match self.column_index(key) {
            Some(index) => index,
            None => return self,
        };
        let Some(other_key) = other.column_index(key) else {
            return self;
        };
        let appended: Vec<usize> = (0..other.columns.len())
            .filter(|&i| i != other_key && self.column_index(&other.columns[i]).is_none())
            .collect();
        for &i in &appended {
            self.columns.push(other.columns[i].clone());
        }
        for row in &mut self.rows {
            let matched = other
                .rows
                .iter()
                .find(|other_row| other_row[other_key] == row[self_key]);
            for &i in &appended {
                row.push(match matched {
                    Some(other_row) => other_row[i].clone(),
                    None => FieldValue::Null,
                });
            }
        }
        self
    }

    fn drop_column(&mut self, column: &str) {
        if let Some(index) = self.column_index(column) {
            self.columns.remove(index);
            for row in &mut self.rows {
                row.remove(index);
            }
        }
    }
}
