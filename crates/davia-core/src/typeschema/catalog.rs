//! Declared types and their inheritance chains

use super::expr::TypeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The structural shape a declared type has.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TypeShape {
    /// Fields declared by attribute annotations, dict-like at runtime.
    #[default]
    TypedDict,
    /// Flat field list of a value aggregate.
    Dataclass,
    /// Schema-validated model.
    Model,
    /// Plain nominal class, no fields exposed.
    Class,
}

/// One declared field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// A user-declared type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeDecl {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shape: TypeShape,
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            shape,
            bases: Vec::new(),
            fields: Vec::new(),
            doc: None,
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.fields.push(FieldDecl::new(name, ty));
        self
    }
}

/// Builtin classes that serialize as a plain `Class`.
const BUILTIN_CLASSES: &[&str] = &[
    "str", "int", "float", "bool", "bytes", "complex", "object", "list", "dict", "set",
    "frozenset", "tuple", "type", "Any", "AnyMessage", "BaseMessage", "HumanMessage",
    "AIMessage", "SystemMessage", "ToolMessage", "Document", "datetime", "date", "UUID",
];

/// What a bare name resolves to.
#[derive(Debug)]
pub enum Resolved<'a> {
    Decl(&'a TypeDecl),
    Builtin(&'static str),
}

/// Name → declaration lookup for one module, layered over the prelude.
#[derive(Clone, Debug, Default)]
pub struct TypeCatalog {
    decls: HashMap<String, TypeDecl>,
}

impl TypeCatalog {
    /// Empty catalog without prelude types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the prelude graph state types.
    pub fn with_prelude() -> Self {
        let mut catalog = Self::new();
        catalog.insert(
            TypeDecl::new("MessagesState", TypeShape::TypedDict)
                .with_field("messages", "Annotated[list[AnyMessage], add_messages]"),
        );
        catalog
    }

    /// Insert or replace a declaration.
    pub fn insert(&mut self, decl: TypeDecl) {
        self.decls.insert(decl.name.clone(), decl);
    }

    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.decls
            .get(name)
            .or_else(|| self.decls.get(short_name(name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn resolve(&self, name: &str) -> Option<Resolved<'_>> {
        if let Some(decl) = self.get(name) {
            return Some(Resolved::Decl(decl));
        }
        let short = short_name(name);
        if short == "None" || short == "NoneType" {
            return Some(Resolved::Builtin("NoneType"));
        }
        BUILTIN_CLASSES
            .iter()
            .find(|b| **b == short)
            .copied()
            .map(Resolved::Builtin)
    }

    /// Declarations from the most-base type to `name` itself.
    ///
    /// Bases are visited depth-first before the type that names them, each
    /// declaration at most once, so cyclic `bases` lists terminate.
    pub fn linearize(&self, name: &str) -> Vec<&TypeDecl> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_chain(name, &mut out, &mut seen);
        out
    }

    fn collect_chain<'a>(
        &'a self,
        name: &str,
        out: &mut Vec<&'a TypeDecl>,
        seen: &mut HashSet<String>,
    ) {
        let Some(decl) = self.get(name) else {
            return;
        };
        if !seen.insert(decl.name.clone()) {
            return;
        }
        for base in &decl.bases {
            self.collect_chain(base, out, seen);
        }
        out.push(decl);
    }
}

impl Extend<TypeDecl> for TypeCatalog {
    fn extend<I: IntoIterator<Item = TypeDecl>>(&mut self, iter: I) {
        for decl in iter {
            self.insert(decl);
        }
    }
}

fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
