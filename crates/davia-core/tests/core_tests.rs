//! Tests for davia-core: types, locators, wire protocol, type schemas, errors

use davia_core::typeschema::*;
use davia_core::*;
use serde_json::json;

// ===========================================================================
// Role / ChatMessage
// ===========================================================================

#[test]
fn role_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
}

#[test]
fn unknown_role_is_rejected() {
    let res: std::result::Result<ChatMessage, _> =
        serde_json::from_str(r#"{"role":"system","content":"x"}"#);
    assert!(res.is_err());
}

#[test]
fn chat_request_thread_id_is_optional() {
    let req: ChatRequest =
        serde_json::from_str(r#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
    assert_eq!(req.messages.len(), 1);
    assert!(req.thread_id.is_none());

    let req: ChatRequest = serde_json::from_str(
        r#"{"messages":[{"role":"assistant","content":"yo"}],"thread_id":"t-1"}"#,
    )
    .unwrap();
    assert_eq!(req.thread_id.as_deref(), Some("t-1"));
    assert_eq!(req.messages[0].role, Role::Assistant);
}

#[test]
fn graph_message_carries_type_and_fresh_id() {
    let a = ChatMessage::user("hello").to_graph_message();
    let b = ChatMessage::user("hello").to_graph_message();
    assert_eq!(a["type"], "human");
    assert_eq!(a["content"], "hello");
    assert_ne!(a["id"], b["id"]);
    assert_eq!(ChatMessage::assistant("x").to_graph_message()["type"], "ai");
}

#[test]
fn schema_entry_serializes_kind_lowercase() {
    let entry = SchemaEntry {
        name: "summarize".into(),
        docstring: None,
        source_file: Some("tasks.toml".into()),
        user_state_snapshot: None,
        kind: EntryKind::Task,
    };
    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value["kind"], "task");
    assert_eq!(value["docstring"], serde_json::Value::Null);
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn config_missing_names_the_key() {
    let err = Error::config_missing("DAVIA_STATE_DB");
    assert!(err.to_string().contains("DAVIA_STATE_DB"));
}

#[test]
fn loader_errors_carry_locator_and_cause() {
    let err = Error::attribute_missing("graph.toml:nope", "no export named nope");
    let text = err.to_string();
    assert!(text.contains("graph.toml:nope"));
    assert!(text.contains("no export named nope"));
    assert!(err.is_loader_error());
    assert!(!Error::NotFound("x".into()).is_loader_error());
}

#[test]
fn locator_from_str() {
    let loc: Locator = "agent:workflow".parse().unwrap();
    assert_eq!(loc.identifier(), "workflow");
    assert!("agent".parse::<Locator>().is_err());
}

// ===========================================================================
// Wire protocol
// ===========================================================================

#[test]
fn wire_chunk_unicode_payload() {
    assert_eq!(WireChunk::text("héllo ✓").encode(), "0:\"héllo ✓\"\n");
}

// ===========================================================================
// Type schemas
// ===========================================================================

fn chain_catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::with_prelude();
    catalog.insert(
        TypeDecl::new("Base", TypeShape::TypedDict)
            .with_field("id", "str")
            .with_field("score", "int")
            .with_field("tags", "list[str]"),
    );
    catalog.insert(
        TypeDecl::new("Derived", TypeShape::TypedDict)
            .with_base("Base")
            .with_field("score", "float")
            .with_field("extra", "Optional[int]"),
    );
    catalog
}

#[test]
fn derived_field_overrides_base_in_place() {
    let catalog = chain_catalog();
    let desc = serialize_type(&catalog, &TypeRef::named("Derived"));
    let fields = desc.fields().expect("record has fields");
    assert_eq!(fields.names(), vec!["id", "score", "tags", "extra"]);
    assert_eq!(fields.get("score"), Some(&TypeDescriptor::class("float")));
}

#[test]
fn record_json_shape() {
    let catalog = chain_catalog();
    let desc = serialize_type(&catalog, &TypeRef::named("Base"));
    let value = serde_json::to_value(&desc).unwrap();
    assert_eq!(
        value,
        json!({
            "type": "TypedDict",
            "name": "Base",
            "fields": {
                "id": {"type": "Class", "name": "str"},
                "score": {"type": "Class", "name": "int"},
                "tags": {"type": "Generic", "origin": "list", "args": [{"type": "Class", "name": "str"}]}
            }
        })
    );
}

#[test]
fn merged_map_serializes_in_declaration_order() {
    let catalog = chain_catalog();
    let desc = serialize_type(&catalog, &TypeRef::named("Derived"));
    let text = serde_json::to_string(&desc).unwrap();
    let positions: Vec<usize> = ["\"id\"", "\"score\"", "\"tags\"", "\"extra\""]
        .iter()
        .map(|k| text.find(k).unwrap())
        .collect();
    let mut sorted = positions.clone();
    sorted.sort();
    assert_eq!(positions, sorted);
}

#[test]
fn messages_state_subclass_inherits_messages() {
    let mut catalog = TypeCatalog::with_prelude();
    catalog.insert(
        TypeDecl::new("CustomState", TypeShape::TypedDict)
            .with_base("MessagesState")
            .with_field("summary", "str"),
    );
    let desc = serialize_type(&catalog, &TypeRef::named("CustomState"));
    let value = serde_json::to_value(&desc).unwrap();
    assert_eq!(value["fields"]["messages"]["type"], "Annotated");
    assert_eq!(value["fields"]["messages"]["base_type"]["origin"], "list");
    assert_eq!(value["fields"]["messages"]["metadata"], json!(["add_messages"]));
    assert_eq!(value["fields"]["summary"]["name"], "str");
}

#[test]
fn dataclass_and_model_shapes() {
    let mut catalog = TypeCatalog::new();
    catalog.insert(TypeDecl::new("Mixin", TypeShape::TypedDict).with_field("ignored", "int"));
    catalog.insert(
        TypeDecl::new("Point", TypeShape::Dataclass)
            .with_base("Mixin")
            .with_field("x", "float")
            .with_field("y", "float"),
    );
    catalog.insert(
        TypeDecl::new("Settings", TypeShape::Model)
            .with_base("Mixin")
            .with_field("name", "str"),
    );

    let point = serialize_type(&catalog, &TypeRef::named("Point"));
    assert!(matches!(point, TypeDescriptor::ValueAggregate { .. }));
    assert_eq!(point.fields().unwrap().names(), vec!["x", "y"]);

    let settings = serialize_type(&catalog, &TypeRef::named("Settings"));
    assert!(matches!(settings, TypeDescriptor::SchemaModel { .. }));
    assert_eq!(settings.fields().unwrap().names(), vec!["ignored", "name"]);
    assert_eq!(serde_json::to_value(&settings).unwrap()["type"], "PydanticModel");
}

#[test]
fn plain_class_and_literals() {
    let mut catalog = TypeCatalog::new();
    catalog.insert(TypeDecl::new("Client", TypeShape::Class).with_field("hidden", "int"));
    assert_eq!(
        serialize_type(&catalog, &TypeRef::named("Client")),
        TypeDescriptor::class("Client")
    );
    let lit = serialize_type(&catalog, &TypeRef::parse("Literal['fast', 3]"));
    assert_eq!(
        serde_json::to_value(&lit).unwrap(),
        json!({
            "type": "Generic",
            "origin": "Literal",
            "args": [{"type": "Basic", "value": "fast"}, {"type": "Basic", "value": "3"}]
        })
    );
}

#[test]
fn generic_without_args_has_empty_list() {
    let catalog = TypeCatalog::new();
    let value = serde_json::to_value(serialize_type(&catalog, &TypeRef::parse("Sequence[]"))).unwrap();
    assert_eq!(value, json!({"type": "Generic", "origin": "Sequence", "args": []}));
}

#[test]
fn serializer_is_total_over_odd_inputs() {
    let catalog = chain_catalog();
    let inputs = [
        "",
        "???",
        "Callable[[int], str]",
        "Mystery",
        "dict[str, Mystery]",
        "Annotated[Derived, Field(gt=0)]",
        "list[",
        "'just a string'",
        "-",
    ];
    for input in inputs {
        // must produce a descriptor and serialize without error
        let desc = serialize_type(&catalog, &TypeRef::parse(input));
        serde_json::to_string(&desc).unwrap();
    }
    assert_eq!(
        serialize_type(&catalog, &TypeRef::parse("Mystery")),
        TypeDescriptor::unknown("Mystery")
    );
}

#[test]
fn manifest_field_decl_deserializes_type_text() {
    let decl: TypeDecl = serde_json::from_value(json!({
        "name": "State",
        "shape": "typed_dict",
        "fields": [{"name": "messages", "type": "list[AnyMessage]"}]
    }))
    .unwrap();
    assert_eq!(decl.fields[0].ty, TypeRef::generic("list", vec![TypeRef::named("AnyMessage")]));
    assert!(decl.bases.is_empty());
}
