//! Version-aware endpoint schemas
//!
//! The remote API renames and reshapes fields between releases. Steps never
//! hardcode field names: they ask the [`SchemaManager`] for the schema of an
//! endpoint at the server's version and fall back to the closest older
//! release when that exact version has no schema.

pub mod defaults;
mod manager;
mod mapping;
mod version;

pub use manager::SchemaManager;
pub use mapping::{DataType, EndpointSchema, FieldMapping};
pub use version::RemoteVersion;
