//! Handles: resolved graphs and tasks with the metadata needed to describe them

use davia_core::typeschema::{TypeCatalog, TypeRef, TypeSchemaSerializer};
use davia_core::{EntryKind, SchemaEntry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A graph export: an opaque invokable with a declared state shape.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GraphDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default = "default_state")]
    pub state: TypeRef,
}

fn default_state() -> TypeRef {
    TypeRef::named("MessagesState")
}

impl GraphDef {
    pub fn new(state: impl Into<TypeRef>) -> Self {
        Self {
            doc: None,
            state: state.into(),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// One task parameter.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// A task export: a single callable registered for introspection.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParamDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<TypeRef>,
}

impl TaskDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.parameters.push(ParamDecl {
            name: name.into(),
            ty: Some(ty.into()),
            default: None,
        });
        self
    }

    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        ty: impl Into<TypeRef>,
        default: Value,
    ) -> Self {
        self.parameters.push(ParamDecl {
            name: name.into(),
            ty: Some(ty.into()),
            default: Some(default),
        });
        self
    }

    pub fn returns(mut self, ty: impl Into<TypeRef>) -> Self {
        self.returns = Some(ty.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Graph(GraphDef),
    Task(TaskDef),
}

/// A resolved graph or task.
#[derive(Clone, Debug)]
pub struct Handle {
    pub name: String,
    /// Locator it was loaded from; `None` for in-process registrations.
    pub locator: Option<String>,
    pub source_file: Option<String>,
    pub target: Target,
    pub catalog: Arc<TypeCatalog>,
}

impl Handle {
    pub fn graph(name: impl Into<String>, def: GraphDef) -> Self {
        Self::new(name, Target::Graph(def))
    }

    pub fn task(name: impl Into<String>, def: TaskDef) -> Self {
        Self::new(name, Target::Task(def))
    }

    fn new(name: impl Into<String>, target: Target) -> Self {
        Self {
            name: name.into(),
            locator: None,
            source_file: None,
            target,
            catalog: Arc::new(TypeCatalog::with_prelude()),
        }
    }

    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<TypeCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn kind(&self) -> EntryKind {
        match self.target {
            Target::Graph(_) => EntryKind::Graph,
            Target::Task(_) => EntryKind::Task,
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match &self.target {
            Target::Graph(g) => g.doc.as_deref(),
            Target::Task(t) => t.doc.as_deref(),
        }
    }

    pub fn as_graph(&self) -> Option<&GraphDef> {
        match &self.target {
            Target::Graph(g) => Some(g),
            Target::Task(_) => None,
        }
    }

    /// Structural snapshot, recomputed on every call.
    ///
    /// Tasks: `{"parameters": {name: {"type", "default"}}, "return_type"}`.
    /// Graphs: the serialized state type.
    pub fn snapshot(&self) -> Value {
        let mut serializer = TypeSchemaSerializer::new(&self.catalog);
        match &self.target {
            Target::Task(task) => {
                let mut parameters = Map::new();
                for param in &task.parameters {
                    let ty = param
                        .ty
                        .as_ref()
                        .map(|t| to_json(&serializer.serialize(t)))
                        .unwrap_or(Value::Null);
                    parameters.insert(
                        param.name.clone(),
                        serde_json::json!({
                            "type": ty,
                            "default": param.default.clone().unwrap_or(Value::Null),
                        }),
                    );
                }
                let return_type = task
                    .returns
                    .as_ref()
                    .map(|t| to_json(&serializer.serialize(t)))
                    .unwrap_or(Value::Null);
                serde_json::json!({
                    "parameters": parameters,
                    "return_type": return_type,
                })
            }
            Target::Graph(graph) => to_json(&serializer.serialize(&graph.state)),
        }
    }

    pub fn schema_entry(&self) -> SchemaEntry {
        SchemaEntry {
            name: self.name.clone(),
            docstring: self.doc().map(str::to_string),
            source_file: self.source_file.clone(),
            user_state_snapshot: Some(self.snapshot()),
            kind: self.kind(),
        }
    }
}

fn to_json(descriptor: &impl Serialize) -> Value {
    serde_json::to_value(descriptor).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_snapshot_lists_parameters_and_return() {
        let handle = Handle::task(
            "summarize",
            TaskDef::new()
                .with_doc("Summarize text.")
                .param("text", "str")
                .param_with_default("max_words", "int", json!(50))
                .returns("str"),
        );
        let snap = handle.snapshot();
        assert_eq!(snap["parameters"]["text"]["type"], json!({"type": "Class", "name": "str"}));
        assert_eq!(snap["parameters"]["text"]["default"], Value::Null);
        assert_eq!(snap["parameters"]["max_words"]["default"], json!(50));
        assert_eq!(snap["return_type"]["name"], "str");
    }

    #[test]
    fn untyped_parameter_and_missing_return_are_null() {
        let handle = Handle::task(
            "noop",
            TaskDef {
                doc: None,
                parameters: vec![ParamDecl {
                    name: "anything".into(),
                    ty: None,
                    default: None,
                }],
                returns: None,
            },
        );
        let snap = handle.snapshot();
        assert_eq!(snap["parameters"]["anything"]["type"], Value::Null);
        assert_eq!(snap["return_type"], Value::Null);
    }

    #[test]
    fn graph_snapshot_is_state_descriptor() {
        let handle = Handle::graph("chat", GraphDef::new("MessagesState").with_doc("Chat graph"));
        let entry = handle.schema_entry();
        assert_eq!(entry.kind, EntryKind::Graph);
        assert_eq!(entry.docstring.as_deref(), Some("Chat graph"));
        let snap = entry.user_state_snapshot.unwrap();
        assert_eq!(snap["type"], "TypedDict");
        assert_eq!(snap["name"], "MessagesState");
    }
}
