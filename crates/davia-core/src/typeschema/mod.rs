//! Structural type schemas
//!
//! A module manifest declares its types statically ([`TypeDecl`]) and refers
//! to them with textual type expressions ([`TypeRef`]). The serializer turns
//! a reference into a [`TypeDescriptor`] tree, merging inherited fields
//! base-first with derived declarations overriding in place.
//!
//! Dispatch, first match wins:
//!
//! | input                         | descriptor            |
//! |-------------------------------|-----------------------|
//! | `Annotated[base, meta...]`    | `Annotated`           |
//! | declared `typed_dict`         | `TypedDict`           |
//! | declared `dataclass`          | `Dataclass`           |
//! | declared `model`              | `PydanticModel`       |
//! | `origin[args...]`             | `Generic`             |
//! | declared `class`, builtin     | `Class`               |
//! | literal                       | `Basic`               |
//! | anything else                 | `Unknown`             |
//!
//! A declared type reached again while it is still being expanded yields
//! `Recursive` instead of recursing.

mod catalog;
mod expr;
mod serialize;

pub use catalog::{FieldDecl, Resolved, TypeCatalog, TypeDecl, TypeShape};
pub use expr::{LiteralValue, TypeRef};
pub use serialize::{serialize_type, FieldMap, TypeDescriptor, TypeSchemaSerializer, MAX_DEPTH};
