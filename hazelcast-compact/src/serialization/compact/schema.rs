//! Immutable schema model and its builder.

use crate::error::{HazelcastError, Result};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::field_kind::FieldKind;
use super::fingerprint;

/// A field of a [`Schema`] with its computed position.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchemaField {
    name: String,
    kind: FieldKind,
    offset: i32,
    bit_offset: i8,
    index: i32,
}

impl SchemaField {
    fn new(name: String, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            offset: -1,
            bit_offset: -1,
            index: -1,
        }
    }

    /// Returns the field name as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Byte offset from the start of the fixed region, or -1 for variable-size fields.
    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// Bit position inside the byte at [`offset`](Self::offset) for booleans, -1 otherwise.
    pub fn bit_offset(&self) -> i8 {
        self.bit_offset
    }

    /// Position in the offset table for variable-size fields, -1 otherwise.
    pub fn index(&self) -> i32 {
        self.index
    }
}

#[derive(Debug)]
struct SchemaInner {
    type_name: String,
    id: i64,
    fields: Vec<SchemaField>,
    by_name: HashMap<String, usize>,
    fixed_size_fields_length: usize,
    variable_size_field_count: usize,
    has_reference_fields: bool,
}

/// Describes the fields of a compact type.
///
/// Fields are held in canonical layout order: fixed-size fields by
/// decreasing size, then booleans, then variable-size fields, each group in
/// name order. A schema never changes after construction and clones share
/// the same allocation.
#[derive(Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "SchemaRepr", into = "SchemaRepr")
)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

/// Ordinal UTF-16 ordering, the name order every client sorts by.
pub(crate) fn compare_names(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

impl Schema {
    /// Builds a schema from `(name, kind)` pairs given in any order.
    ///
    /// Field names must be unique ignoring case.
    pub fn new<N: Into<String>>(
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = (N, FieldKind)>,
    ) -> Result<Self> {
        let type_name = type_name.into();
        let mut seen = HashSet::new();
        let mut named = Vec::new();
        for (name, kind) in fields {
            let name = name.into();
            if !seen.insert(name.to_lowercase()) {
                return Err(HazelcastError::serialization(format!(
                    "duplicate field '{}' in schema of '{}'",
                    name, type_name
                )));
            }
            named.push(SchemaField::new(name, kind));
        }
        named.sort_by(|a, b| compare_names(&a.name, &b.name));

        let id = fingerprint::schema_fingerprint(
            &type_name,
            named.len(),
            named.iter().map(|f| (f.name.as_str(), f.kind)),
        );

        let mut fixed = Vec::new();
        let mut booleans = Vec::new();
        let mut variable = Vec::new();
        for field in named {
            if field.kind == FieldKind::Boolean {
                booleans.push(field);
            } else if field.kind.fixed_size().is_some() {
                fixed.push(field);
            } else {
                variable.push(field);
            }
        }
        // Stable: equal sizes stay in name order.
        fixed.sort_by_key(|f| std::cmp::Reverse(f.kind.fixed_size().unwrap_or(0)));

        let mut offset = 0usize;
        for field in &mut fixed {
            field.offset = offset as i32;
            offset += field.kind.fixed_size().unwrap_or(0);
        }
        for (bit, field) in booleans.iter_mut().enumerate() {
            field.offset = (offset + bit / 8) as i32;
            field.bit_offset = (bit % 8) as i8;
        }
        offset += booleans.len().div_ceil(8);
        for (index, field) in variable.iter_mut().enumerate() {
            field.index = index as i32;
        }

        let variable_size_field_count = variable.len();
        let mut fields = fixed;
        fields.append(&mut booleans);
        fields.append(&mut variable);
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.to_lowercase(), i))
            .collect();
        let has_reference_fields = fields.iter().any(|f| f.kind.is_reference());

        Ok(Self {
            inner: Arc::new(SchemaInner {
                type_name,
                id,
                fields,
                by_name,
                fixed_size_fields_length: offset,
                variable_size_field_count,
                has_reference_fields,
            }),
        })
    }

    /// Starts a [`SchemaBuilder`].
    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(type_name)
    }

    /// Returns the type name.
    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    /// Returns the schema id (fingerprint).
    pub fn id(&self) -> i64 {
        self.inner.id
    }

    /// Returns the fields in canonical layout order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.inner.fields
    }

    /// Looks up a field by name, ignoring case.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.position(name).map(|i| &self.inner.fields[i])
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        match self.inner.by_name.get(name) {
            Some(&i) => Some(i),
            None => self.inner.by_name.get(&name.to_lowercase()).copied(),
        }
    }

    /// Returns true if a field with the given name exists, ignoring case.
    pub fn has_field(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        self.inner.fields.len()
    }

    /// Byte length of the fixed region, including packed booleans.
    pub fn fixed_size_fields_length(&self) -> usize {
        self.inner.fixed_size_fields_length
    }

    /// Number of entries in the offset table.
    pub fn variable_size_field_count(&self) -> usize {
        self.inner.variable_size_field_count
    }

    /// Returns true if any field holds nested compact values.
    pub fn has_reference_fields(&self) -> bool {
        self.inner.has_reference_fields
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.id == other.inner.id
                && self.inner.type_name == other.inner.type_name
                && self.inner.fields == other.inner.fields)
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.inner.type_name)
            .field("id", &self.inner.id)
            .field("fields", &self.inner.fields)
            .finish()
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct SchemaRepr {
    type_name: String,
    fields: Vec<FieldRepr>,
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct FieldRepr {
    name: String,
    kind: FieldKind,
}

#[cfg(feature = "serde")]
impl From<Schema> for SchemaRepr {
    fn from(schema: Schema) -> Self {
        Self {
            type_name: schema.type_name().to_string(),
            fields: schema
                .fields()
                .iter()
                .map(|f| FieldRepr {
                    name: f.name.clone(),
                    kind: f.kind,
                })
                .collect(),
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<SchemaRepr> for Schema {
    type Error = HazelcastError;

    fn try_from(repr: SchemaRepr) -> Result<Self> {
        Schema::new(repr.type_name, repr.fields.into_iter().map(|f| (f.name, f.kind)))
    }
}

/// Accumulates fields for a [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    type_name: String,
    fields: Vec<(String, FieldKind)>,
}

impl SchemaBuilder {
    /// Creates a builder for the given type name.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field. Duplicates are reported by [`build`](Self::build).
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind));
        self
    }

    /// Appends a field, failing immediately if the name is already present.
    pub fn add_field(&mut self, name: &str, kind: FieldKind) -> Result<()> {
        if self.contains(name) {
            return Err(HazelcastError::serialization(format!(
                "field '{}' is already defined for '{}'",
                name, self.type_name
            )));
        }
        self.fields.push((name.to_string(), kind));
        Ok(())
    }

    /// Returns true if a field with this name was added, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.fields.iter().any(|(n, _)| n.to_lowercase() == name)
    }

    /// Returns the type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Sorts the fields, assigns positions and computes the fingerprint.
    pub fn build(self) -> Result<Schema> {
        Schema::new(self.type_name, self.fields)
    }
}
