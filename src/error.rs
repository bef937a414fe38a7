use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{SchemaId, SchemaKind};
use crate::tree::NodeId;
use crate::unres::RequestKind;

/// Violation classes a caller can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    MissingElement,
    TooFew,
    TooMany,
    OutOfOrder,
    ConflictingCase,
    DuplicateInstance,
    ObsoleteData,
    ObsoleteType,
    InvalidElement,
    DeferredResolutionFailed,
    InvalidOptions,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingElement => "missing-element",
            ErrorKind::TooFew => "too-few",
            ErrorKind::TooMany => "too-many",
            ErrorKind::OutOfOrder => "out-of-order",
            ErrorKind::ConflictingCase => "conflicting-case",
            ErrorKind::DuplicateInstance => "duplicate-instance",
            ErrorKind::ObsoleteData => "obsolete-data",
            ErrorKind::ObsoleteType => "obsolete-type",
            ErrorKind::InvalidElement => "invalid-element",
            ErrorKind::DeferredResolutionFailed => "deferred-resolution-failed",
            ErrorKind::InvalidOptions => "invalid-options",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single node's validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Element \"{element}\" in \"{parent}\" is disabled by an if-feature condition")]
    FeatureDisabled { element: String, parent: String },

    #[error("State data element \"{element}\" is not allowed in \"{parent}\"")]
    StateData { element: String, parent: String },

    #[error("Invalid order: \"{preceding}\" is placed before \"{element}\"")]
    OutOfOrder { element: String, preceding: String },

    #[error("Missing required element \"{element}\" in \"{parent}\"")]
    MissingElement { element: String, parent: String },

    #[error("Key \"{key}\" of list \"{list}\" is not at its schema-defined position")]
    MisplacedKey { key: String, list: String },

    #[error("Too few \"{element}\" instances in \"{parent}\"")]
    TooFew { element: String, parent: String },

    #[error("Too many \"{element}\" instances in \"{parent}\"")]
    TooMany { element: String, parent: String },

    #[error("Data for more than one case of choice \"{choice}\" (element \"{element}\")")]
    ConflictingCase { element: String, choice: String },

    #[error("Duplicate instance of \"{element}\" in \"{parent}\"")]
    DuplicateInstance { element: String, parent: String },

    #[error("Instances of \"{element}\" in \"{parent}\" violate the unique constraint on {leaves}")]
    NotUnique {
        element: String,
        parent: String,
        leaves: String,
    },

    #[error("Obsolete data \"{element}\" instantiated in \"{parent}\"")]
    ObsoleteData { element: String, parent: String },

    #[error("Element \"{element}\" in \"{parent}\" instantiates obsolete type or identity \"{type_name}\"")]
    ObsoleteType {
        element: String,
        parent: String,
        type_name: String,
    },

    #[error("Unable to resolve {request} of \"{element}\": {source}")]
    DeferredResolutionFailed {
        element: String,
        request: RequestKind,
        #[source]
        source: ResolveError,
    },

    #[error("Conflicting validation modes: {modes}")]
    ConflictingModes { modes: String },

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::FeatureDisabled { .. } | ValidationError::StateData { .. } => {
                ErrorKind::InvalidElement
            }
            ValidationError::OutOfOrder { .. } | ValidationError::MisplacedKey { .. } => {
                ErrorKind::OutOfOrder
            }
            ValidationError::MissingElement { .. } => ErrorKind::MissingElement,
            ValidationError::TooFew { .. } => ErrorKind::TooFew,
            ValidationError::TooMany { .. } => ErrorKind::TooMany,
            ValidationError::ConflictingCase { .. } => ErrorKind::ConflictingCase,
            ValidationError::DuplicateInstance { .. } | ValidationError::NotUnique { .. } => {
                ErrorKind::DuplicateInstance
            }
            ValidationError::ObsoleteData { .. } => ErrorKind::ObsoleteData,
            ValidationError::ObsoleteType { .. } => ErrorKind::ObsoleteType,
            ValidationError::DeferredResolutionFailed { .. } => {
                ErrorKind::DeferredResolutionFailed
            }
            ValidationError::ConflictingModes { .. } => ErrorKind::InvalidOptions,
            ValidationError::Tree(_) => ErrorKind::Internal,
        }
    }

    /// Name of the offending element, when the error is tied to one
    pub fn element(&self) -> Option<&str> {
        match self {
            ValidationError::FeatureDisabled { element, .. }
            | ValidationError::StateData { element, .. }
            | ValidationError::OutOfOrder { element, .. }
            | ValidationError::MissingElement { element, .. }
            | ValidationError::TooFew { element, .. }
            | ValidationError::TooMany { element, .. }
            | ValidationError::ConflictingCase { element, .. }
            | ValidationError::DuplicateInstance { element, .. }
            | ValidationError::NotUnique { element, .. }
            | ValidationError::ObsoleteData { element, .. }
            | ValidationError::ObsoleteType { element, .. }
            | ValidationError::DeferredResolutionFailed { element, .. } => Some(element),
            ValidationError::MisplacedKey { key, .. } => Some(key),
            ValidationError::ConflictingModes { .. } | ValidationError::Tree(_) => None,
        }
    }
}

/// Failure reported by the deferred resolver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("target \"{path}\" does not exist")]
    TargetNotFound { path: String },

    #[error("target \"{path}\" is ambiguous")]
    Ambiguous { path: String },

    #[error("expression evaluation failed: {0}")]
    Evaluation(String),
}

/// Misuse of the data tree arena
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0} is no longer part of the tree")]
    StaleNode(NodeId),

    #[error("content does not fit {kind} \"{element}\"")]
    ContentMismatch { element: String, kind: SchemaKind },

    #[error("\"{element}\" cannot be placed under \"{parent}\"")]
    WrongParent { element: String, parent: String },

    #[error("cannot merge \"{from}\" into \"{to}\": different schema nodes")]
    SchemaMismatch { to: String, from: String },
}

/// Misuse of the schema builder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown schema node {0:?}")]
    UnknownNode(SchemaId),

    #[error("\"{element}\" cannot be placed under {kind} \"{parent}\"")]
    InvalidParent {
        element: String,
        parent: String,
        kind: SchemaKind,
    },

    #[error("\"{key}\" is not a leaf child of list \"{list}\"")]
    InvalidKey { key: String, list: String },

    #[error("\"{element}\" is not a list")]
    NotAList { element: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Tree result type alias
pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// Schema result type alias
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;
