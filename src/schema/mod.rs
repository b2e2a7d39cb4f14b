//! Node schema catalog.
//!
//! A node type names a topic collected during the dialogue, lists its fields,
//! and carries a declarative [`CollectionSpec`] deciding when it is complete.

pub mod builtins;
mod registry;
mod types;

pub use registry::SchemaRegistry;
pub use types::{
    CollectionSpec, ConditionalRule, DetailRequirement, DetailSubfield, FieldDef, NodeType,
    Operator,
};
