//! Element type descriptors and name resolution.
//!
//! A [`TypeRegistry`] is built once at startup from the static shape of every
//! queryable record type and then shared read-only (typically behind `Arc`).
//! Navigation targets are stored by name and resolved on demand, so
//! self-referencing or mutually-referencing types are fine.
//!
//! Lookups are case-sensitive and exact.

use std::collections::HashMap;
use std::fmt;

use crate::errors::{ConfigurationError, QueryError};
use crate::value::{FieldKind, ValueKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldShape {
    Scalar(FieldKind),
    Navigation {
        target: String,
        cardinality: Cardinality,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    shape: FieldShape,
    nullable: bool,
}

impl FieldDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn shape(&self) -> &FieldShape {
        &self.shape
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn is_navigation(&self) -> bool {
        matches!(self.shape, FieldShape::Navigation { .. })
    }

    /// Kind this field has when used as an expression operand.
    #[must_use]
    pub fn value_kind(&self) -> ValueKind {
        match &self.shape {
            FieldShape::Scalar(kind) => kind.value_kind(),
            FieldShape::Navigation {
                cardinality: Cardinality::One,
                ..
            } => ValueKind::Entity,
            FieldShape::Navigation {
                cardinality: Cardinality::Many,
                ..
            } => ValueKind::Collection,
        }
    }
}

/// Shape of one queryable record type.
#[derive(Clone, Debug)]
pub struct ElementType {
    name: String,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl ElementType {
    pub fn builder(name: impl Into<String>) -> ElementTypeBuilder {
        ElementTypeBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Scalar (non-navigation) fields in declaration order.
    pub fn structural_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_navigation())
    }
}

#[must_use]
pub struct ElementTypeBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl ElementTypeBuilder {
    /// Non-nullable scalar field.
    pub fn field(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.push(name, FieldShape::Scalar(kind), false)
    }

    pub fn nullable_field(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.push(name, FieldShape::Scalar(kind), true)
    }

    /// Single-valued navigation; the related record may be absent.
    pub fn navigation(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        let shape = FieldShape::Navigation {
            target: target.into(),
            cardinality: Cardinality::One,
        };
        self.push(name, shape, true)
    }

    /// Collection-valued navigation.
    pub fn collection(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        let shape = FieldShape::Navigation {
            target: target.into(),
            cardinality: Cardinality::Many,
        };
        self.push(name, shape, false)
    }

    fn push(mut self, name: impl Into<String>, shape: FieldShape, nullable: bool) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            shape,
            nullable,
        });
        self
    }

    fn finish(self) -> Result<ElementType, ConfigurationError> {
        let mut index = HashMap::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            if !is_identifier(&field.name) {
                return Err(ConfigurationError::InvalidName {
                    element_type: self.name.clone(),
                    name: field.name.clone(),
                });
            }
            if index.insert(field.name.clone(), i).is_some() {
                return Err(ConfigurationError::DuplicateField {
                    element_type: self.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
        Ok(ElementType {
            name: self.name,
            fields: self.fields,
            index,
        })
    }
}

/// Opaque handle to an element type inside the registry that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementTypeId(usize);

/// Immutable set of element types, resolvable by name.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: Vec<ElementType>,
    index: HashMap<String, usize>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder { types: Vec::new() }
    }

    #[must_use]
    pub fn element_type(&self, name: &str) -> Option<&ElementType> {
        self.index.get(name).map(|&i| &self.types[i])
    }

    #[must_use]
    pub fn element_type_id(&self, name: &str) -> Option<ElementTypeId> {
        self.index.get(name).copied().map(ElementTypeId)
    }

    /// Element type behind a handle issued by this registry.
    #[must_use]
    pub fn get(&self, id: ElementTypeId) -> &ElementType {
        &self.types[id.0]
    }

    #[must_use]
    #[allow(clippy::unused_self)] // Mirrors resolve_navigation so callers go through the registry
    pub fn resolve_field<'a>(
        &self,
        element_type: &'a ElementType,
        name: &str,
    ) -> Option<&'a FieldDescriptor> {
        element_type.field(name)
    }

    /// Navigation field `name` on `element_type` together with its target type.
    #[must_use]
    pub fn resolve_navigation<'a>(
        &'a self,
        element_type: &'a ElementType,
        name: &str,
    ) -> Option<(&'a FieldDescriptor, &'a ElementType)> {
        let field = element_type.field(name)?;
        match &field.shape {
            FieldShape::Navigation { target, .. } => {
                self.element_type(target).map(|target| (field, target))
            }
            FieldShape::Scalar(_) => None,
        }
    }

    /// Resolve a segmented path starting at `element_type`.
    ///
    /// Every segment but the last must be a single-valued navigation.
    ///
    /// # Errors
    /// `QueryError::UnknownProperty` for an unknown segment,
    /// `QueryError::TypeMismatch` when a scalar or collection segment would
    /// have to be traversed.
    pub fn resolve_path<S: AsRef<str>>(
        &self,
        element_type: &ElementType,
        segments: &[S],
    ) -> Result<PropertyPath, QueryError> {
        let Some((last, init)) = segments.split_last() else {
            return Err(QueryError::parse(0, "empty property path"));
        };

        let mut current = element_type;
        for segment in init {
            let segment = segment.as_ref();
            let field = current
                .field(segment)
                .ok_or_else(|| QueryError::unknown_property(segment, current.name()))?;
            current = match &field.shape {
                FieldShape::Navigation {
                    target,
                    cardinality: Cardinality::One,
                } => self
                    .element_type(target)
                    .ok_or_else(|| QueryError::unknown_property(segment, current.name()))?,
                FieldShape::Navigation {
                    cardinality: Cardinality::Many,
                    ..
                } => {
                    return Err(QueryError::type_mismatch(format!(
                        "cannot traverse collection navigation '{segment}'"
                    )));
                }
                FieldShape::Scalar(_) => {
                    return Err(QueryError::type_mismatch(format!(
                        "'{segment}' is not a navigation property"
                    )));
                }
            };
        }

        let last = last.as_ref();
        let leaf = current
            .field(last)
            .ok_or_else(|| QueryError::unknown_property(last, current.name()))?;

        Ok(PropertyPath {
            segments: segments.iter().map(|s| s.as_ref().to_owned()).collect(),
            kind: leaf.value_kind(),
        })
    }
}

#[must_use]
pub struct TypeRegistryBuilder {
    types: Vec<ElementTypeBuilder>,
}

impl TypeRegistryBuilder {
    pub fn element_type(mut self, element_type: ElementTypeBuilder) -> Self {
        self.types.push(element_type);
        self
    }

    /// Validate and freeze the registry.
    ///
    /// # Errors
    /// Returns `ConfigurationError` for duplicate types or fields, names that
    /// are not identifiers, or navigations to unregistered types.
    pub fn build(self) -> Result<TypeRegistry, ConfigurationError> {
        let mut index = HashMap::with_capacity(self.types.len());
        for (i, ty) in self.types.iter().enumerate() {
            if !is_identifier(&ty.name) {
                return Err(ConfigurationError::InvalidName {
                    element_type: ty.name.clone(),
                    name: ty.name.clone(),
                });
            }
            if index.insert(ty.name.clone(), i).is_some() {
                return Err(ConfigurationError::DuplicateElementType(ty.name.clone()));
            }
        }

        let types = self
            .types
            .into_iter()
            .map(ElementTypeBuilder::finish)
            .collect::<Result<Vec<_>, _>>()?;

        for ty in &types {
            for field in &ty.fields {
                if let FieldShape::Navigation { target, .. } = &field.shape
                    && !index.contains_key(target)
                {
                    return Err(ConfigurationError::UnknownNavigationTarget {
                        element_type: ty.name.clone(),
                        field: field.name.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        tracing::debug!(element_types = types.len(), "type registry built");
        Ok(TypeRegistry { types, index })
    }
}

/// A resolved chain of field names from an element type to a leaf.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    segments: Vec<String>,
    kind: ValueKind,
}

impl PropertyPath {
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Kind of the leaf segment.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
