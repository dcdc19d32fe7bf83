//! Error taxonomy.
//!
//! [`ResolveError`] covers bind time and is fatal: the overlay cannot run with
//! a missing handle. [`InvokeError`] covers runtime calls and is reported per
//! call; it never aborts other slots or other viewers.

use crate::host::HostError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error("cannot find type {0}")]
    TypeNotFound(String),
    #[error("cannot find field {name:?} of type {field_type} (occurrence {index}) on {owner}")]
    FieldNotFound {
        owner: String,
        name: Option<String>,
        field_type: String,
        index: usize,
    },
    #[error("unable to find method {name:?} {params:?} on {owner}")]
    MethodNotFound {
        owner: String,
        name: Option<String>,
        params: Vec<String>,
    },
    #[error("unable to find constructor {shape} on {owner}")]
    ConstructorNotFound { owner: String, shape: String },
    #[error("packet bindings are already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("cannot invoke {member}: {source}")]
    InvocationFailure {
        member: String,
        #[source]
        source: HostError,
    },
    #[error("failed to send packet to {viewer}: {source}")]
    SendFailure {
        viewer: String,
        #[source]
        source: Box<InvokeError>,
    },
    #[error("enum constant {constant} is missing on {owner}")]
    EnumConstantMissing { owner: String, constant: String },
    #[error("no overlay attached for viewer {0}")]
    UnknownViewer(Uuid),
}

impl InvokeError {
    pub fn invocation(member: impl Into<String>, source: HostError) -> Self {
        InvokeError::InvocationFailure {
            member: member.into(),
            source,
        }
    }
}
