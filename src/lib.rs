//! # validate-datatree Library
//!
//! Structural and semantic validation of schema-driven data trees: keys,
//! mandatory children, choices, instance counts, definition status and the
//! in-place normalisation of subtree filters. References and conditions are
//! collected in a worklist for an external resolver.

pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod error_reporter;
pub mod filter;
pub mod keys;
pub mod options;
pub mod output;
pub mod schema;
pub mod siblings;
pub mod tree;
pub mod unres;
pub mod validator;
pub mod value;

pub use config::{Config, ConfigError, ConfigManager, ValidationMode};
pub use content::{Verdict, check_content};
pub use context::check_context;
pub use error::{ErrorKind, ResolveError, SchemaError, TreeError, ValidationError};
pub use error_reporter::{ErrorReporter, VerbosityLevel};
pub use filter::{Remainder, compare, merge};
pub use keys::check_keys;
pub use options::ValidationOptions;
pub use output::{Output, OutputFormat};
pub use schema::{BaseType, Schema, SchemaId, SchemaKind, SchemaNode, Status};
pub use siblings::SiblingSet;
pub use tree::{DataNode, DataTree, LeafValue, NodeContent, NodeId};
pub use unres::{RequestKind, UnresolvedEntry, UnresolvedQueue};
pub use validator::{
    NodeStatus, NodeValidationResult, ValidationConfig, ValidationEngine, ValidationResults,
};
pub use value::{DeferredResolver, check_value};
