//! Type reference → JSON-safe descriptor tree

use super::catalog::{Resolved, TypeCatalog, TypeDecl, TypeShape};
use super::expr::TypeRef;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Nesting beyond this depth is truncated to an `Unknown` marker.
pub const MAX_DEPTH: usize = 64;

const DEPTH_EXCEEDED: &str = "<max depth exceeded>";

/// Descriptor of a type's shape, as sent to clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum TypeDescriptor {
    #[serde(rename = "Basic")]
    Basic { value: String },

    #[serde(rename = "Generic")]
    Generic {
        origin: String,
        args: Vec<TypeDescriptor>,
    },

    #[serde(rename = "Annotated")]
    AnnotatedWrapper {
        base_type: Box<TypeDescriptor>,
        metadata: Vec<String>,
    },

    #[serde(rename = "TypedDict")]
    StructuralRecord { name: String, fields: FieldMap },

    #[serde(rename = "Dataclass")]
    ValueAggregate { name: String, fields: FieldMap },

    #[serde(rename = "PydanticModel")]
    SchemaModel { name: String, fields: FieldMap },

    #[serde(rename = "Class")]
    NominalClass { name: String },

    #[serde(rename = "Unknown")]
    Unknown { value: String },

    /// Back reference to a type already being expanded higher up the tree.
    #[serde(rename = "Recursive")]
    Recursive { name: String },
}

impl TypeDescriptor {
    pub fn class(name: impl Into<String>) -> Self {
        Self::NominalClass { name: name.into() }
    }

    pub fn unknown(value: impl Into<String>) -> Self {
        Self::Unknown {
            value: value.into(),
        }
    }

    /// Merged fields of a record, aggregate or model.
    pub fn fields(&self) -> Option<&FieldMap> {
        match self {
            Self::StructuralRecord { fields, .. }
            | Self::ValueAggregate { fields, .. }
            | Self::SchemaModel { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

/// Field name → descriptor, kept in merge order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldMap(Vec<(String, TypeDescriptor)>);

impl FieldMap {
    /// Replace an existing field in place, or append a new one.
    pub fn insert(&mut self, name: impl Into<String>, descriptor: TypeDescriptor) {
        let name = name.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = descriptor,
            None => self.0.push((name, descriptor)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeDescriptor)> {
        self.0.iter().map(|(n, d)| (n.as_str(), d))
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, descriptor) in &self.0 {
            map.serialize_entry(name, descriptor)?;
        }
        map.end()
    }
}

/// Walks type references against one module's catalog.
///
/// Never fails: shapes it cannot describe become `Unknown`.
pub struct TypeSchemaSerializer<'a> {
    catalog: &'a TypeCatalog,
    expanding: Vec<String>,
}

impl<'a> TypeSchemaSerializer<'a> {
    pub fn new(catalog: &'a TypeCatalog) -> Self {
        Self {
            catalog,
            expanding: Vec::new(),
        }
    }

    pub fn serialize(&mut self, ty: &TypeRef) -> TypeDescriptor {
        self.visit(ty, 0)
    }

    /// Serialize a declared type by name, `Unknown` if the name does not resolve.
    pub fn serialize_named(&mut self, name: &str) -> TypeDescriptor {
        self.visit(&TypeRef::named(name), 0)
    }

    fn visit(&mut self, ty: &TypeRef, depth: usize) -> TypeDescriptor {
        if depth > MAX_DEPTH {
            return TypeDescriptor::unknown(DEPTH_EXCEEDED);
        }
        match ty {
            TypeRef::Annotated { base, metadata } => TypeDescriptor::AnnotatedWrapper {
                base_type: Box::new(self.visit(base, depth + 1)),
                metadata: metadata.iter().map(TypeRef::metadata_text).collect(),
            },
            TypeRef::Named(name) => self.visit_named(name, depth),
            TypeRef::Generic { origin, args } => self.visit_generic(origin, args, depth),
            TypeRef::Literal(value) => TypeDescriptor::Basic {
                value: value.to_string(),
            },
            TypeRef::Opaque(repr) => TypeDescriptor::unknown(repr.clone()),
        }
    }

    fn visit_named(&mut self, name: &str, depth: usize) -> TypeDescriptor {
        let catalog = self.catalog;
        match catalog.resolve(name) {
            Some(Resolved::Decl(decl)) => self.visit_decl(decl, depth),
            Some(Resolved::Builtin(class)) => TypeDescriptor::class(class),
            None => TypeDescriptor::unknown(name),
        }
    }

    fn visit_decl(&mut self, decl: &TypeDecl, depth: usize) -> TypeDescriptor {
        if decl.shape == TypeShape::Class {
            return TypeDescriptor::class(decl.name.clone());
        }
        if self.expanding.iter().any(|n| *n == decl.name) {
            return TypeDescriptor::Recursive {
                name: decl.name.clone(),
            };
        }

        self.expanding.push(decl.name.clone());
        let fields = self.merged_fields(decl, depth);
        self.expanding.pop();

        let name = decl.name.clone();
        match decl.shape {
            TypeShape::TypedDict => TypeDescriptor::StructuralRecord { name, fields },
            TypeShape::Dataclass => TypeDescriptor::ValueAggregate { name, fields },
            TypeShape::Model => TypeDescriptor::SchemaModel { name, fields },
            TypeShape::Class => TypeDescriptor::class(name),
        }
    }

    /// Base-first merge; a derived field replaces the base field in place.
    fn merged_fields(&mut self, decl: &TypeDecl, depth: usize) -> FieldMap {
        let catalog = self.catalog;
        let mut fields = FieldMap::default();
        for link in catalog.linearize(&decl.name) {
            // Value aggregates only inherit fields from other value aggregates.
            if decl.shape == TypeShape::Dataclass && link.shape != TypeShape::Dataclass {
                continue;
            }
            for field in &link.fields {
                let descriptor = self.visit(&field.ty, depth + 1);
                fields.insert(field.name.clone(), descriptor);
            }
        }
        fields
    }

    fn visit_generic(&mut self, origin: &str, args: &[TypeRef], depth: usize) -> TypeDescriptor {
        let mut args: Vec<TypeDescriptor> = args.iter().map(|a| self.visit(a, depth + 1)).collect();
        let origin = match short_origin(origin) {
            "Optional" => {
                args.push(TypeDescriptor::class("NoneType"));
                "Union"
            }
            other => canonical_origin(other),
        };
        TypeDescriptor::Generic {
            origin: origin.to_string(),
            args,
        }
    }
}

/// Serialize one reference with a fresh serializer.
pub fn serialize_type(catalog: &TypeCatalog, ty: &TypeRef) -> TypeDescriptor {
    TypeSchemaSerializer::new(catalog).serialize(ty)
}

fn short_origin(origin: &str) -> &str {
    origin.rsplit('.').next().unwrap_or(origin)
}

/// Capitalised typing aliases report their runtime origin.
fn canonical_origin(origin: &str) -> &str {
    match origin {
        "List" => "list",
        "Dict" => "dict",
        "Set" => "set",
        "FrozenSet" => "frozenset",
        "Tuple" => "tuple",
        "Type" => "type",
        "DefaultDict" => "defaultdict",
        "Deque" => "deque",
        other => other,
    }
}
