//! The seam between the overlay and the game server it runs inside.
//!
//! The host exposes its internal types as [`TypeDescriptor`]s: named types
//! with a supertype, declared fields, methods, constructors and enum
//! constants. Instances are passed around as dynamic [`Value`]s. Nothing in
//! this crate names a host member directly outside of bind time; the
//! resolver turns descriptors into typed handles once and everything else
//! calls through those.

pub mod model;
pub mod sim;

pub use model::{
    ConstructorBody, ConstructorDescriptor, FieldDescriptor, MethodBody, MethodDescriptor,
    TypeDescriptor, TypeHandle,
};
pub use sim::{Revision, SimulatedHost};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Names of the built-in types every host understands.
pub mod types {
    pub const OBJECT: &str = "object";
    pub const NULL: &str = "null";
    pub const BOOL: &str = "bool";
    pub const INT: &str = "int";
    pub const STRING: &str = "string";
    pub const UUID: &str = "uuid";
    pub const LIST: &str = "list";

    pub fn array_of(element: &str) -> String {
        format!("{}[]", element)
    }

    pub fn is_primitive(name: &str) -> bool {
        name == BOOL || name == INT
    }
}

/// Failure raised by a host member while it runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("{0}")]
    Raised(String),
    #[error("expected {expected} argument(s), got {actual}")]
    Arity { expected: usize, actual: usize },
    #[error("expected {expected}, got {actual}")]
    UnexpectedValue { expected: String, actual: String },
    #[error("instance member called without a target")]
    MissingTarget,
}

pub type ObjectRef = Arc<HostObject>;

/// An instance of a host type. Field storage is keyed by [`field_key`].
pub struct HostObject {
    type_name: String,
    fields: Mutex<HashMap<String, Value>>,
}

impl HostObject {
    pub fn new(type_name: impl Into<String>) -> ObjectRef {
        Arc::new(Self {
            type_name: type_name.into(),
            fields: Mutex::new(HashMap::new()),
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Unset fields read as `Value::Null`.
    pub fn get(&self, key: &str) -> Value {
        self.fields.lock().get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.fields.lock().insert(key.into(), value);
    }
}

impl fmt::Debug for HostObject {
    // Objects reference each other; printing fields could recurse forever
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.type_name, self)
    }
}

/// Storage key of a field declared by `owner`.
pub fn field_key(owner: &str, name: &str) -> String {
    format!("{}#{}", owner, name)
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Str(String),
    Uuid(Uuid),
    Enum { owner: String, constant: String },
    Array { element: String, items: Vec<Value> },
    List(Vec<Value>),
    Object(ObjectRef),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (
                Value::Enum { owner, constant },
                Value::Enum {
                    owner: other_owner,
                    constant: other_constant,
                },
            ) => owner == other_owner && constant == other_constant,
            (
                Value::Array { element, items },
                Value::Array {
                    element: other_element,
                    items: other_items,
                },
            ) => element == other_element && items == other_items,
            (Value::List(a), Value::List(b)) => a == b,
            // Objects compare by identity
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// Runtime type of the value, as used for assignability checks.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => types::NULL.to_string(),
            Value::Bool(_) => types::BOOL.to_string(),
            Value::Int(_) => types::INT.to_string(),
            Value::Str(_) => types::STRING.to_string(),
            Value::Uuid(_) => types::UUID.to_string(),
            Value::Enum { owner, .. } => owner.clone(),
            Value::Array { element, .. } => types::array_of(element),
            Value::List(_) => types::LIST.to_string(),
            Value::Object(object) => object.type_name().to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Result<&ObjectRef, HostError> {
        match self {
            Value::Object(object) => Ok(object),
            other => Err(unexpected("object", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str, HostError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(unexpected(types::STRING, other)),
        }
    }

    pub fn as_int(&self) -> Result<i32, HostError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(unexpected(types::INT, other)),
        }
    }

    pub fn as_uuid(&self) -> Result<Uuid, HostError> {
        match self {
            Value::Uuid(id) => Ok(*id),
            other => Err(unexpected(types::UUID, other)),
        }
    }

    pub fn as_list(&self) -> Result<&[Value], HostError> {
        match self {
            Value::List(items) | Value::Array { items, .. } => Ok(items),
            other => Err(unexpected(types::LIST, other)),
        }
    }

    pub fn as_enum_constant(&self) -> Result<&str, HostError> {
        match self {
            Value::Enum { constant, .. } => Ok(constant),
            other => Err(unexpected("enum constant", other)),
        }
    }
}

fn unexpected(expected: &str, actual: &Value) -> HostError {
    HostError::UnexpectedValue {
        expected: expected.to_string(),
        actual: actual.type_name(),
    }
}

/// A connected participant as the host reports it.
///
/// `handle` is the host's own session object; the overlay only ever touches
/// it through bound handles.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub handle: Value,
}

/// What the overlay needs from the game server.
pub trait Host: Send + Sync {
    /// Package of the server implementation, e.g.
    /// `org.bukkit.craftbukkit.v1_8_R3`. Placeholder variables derive from it.
    fn implementation_package(&self) -> String;

    /// Looks up a type by its fully expanded canonical name.
    fn lookup_type(&self, canonical: &str) -> Option<TypeHandle>;

    /// Currently connected sessions, in join order.
    fn online_sessions(&self) -> Vec<Session>;

    /// Whether a value of type `source` can be stored where `target` is
    /// declared.
    fn is_assignable(&self, target: &str, source: &str) -> bool {
        if target == source {
            return true;
        }
        if source == types::NULL || target == types::OBJECT {
            return !types::is_primitive(target) && !types::is_primitive(source);
        }
        if let (Some(target_element), Some(source_element)) =
            (target.strip_suffix("[]"), source.strip_suffix("[]"))
        {
            return !types::is_primitive(source_element)
                && self.is_assignable(target_element, source_element);
        }

        let mut current = self.lookup_type(source);
        // Bounded walk; a malformed host could declare a cycle
        for _ in 0..64 {
            let Some(descriptor) = current else {
                return false;
            };
            match &descriptor.supertype {
                Some(parent) if parent == target => return true,
                Some(parent) => current = self.lookup_type(parent),
                None => return false,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TinyHost {
        types: HashMap<String, TypeHandle>,
    }

    impl Host for TinyHost {
        fn implementation_package(&self) -> String {
            "org.bukkit.craftbukkit.v1_8_R3".to_string()
        }

        fn lookup_type(&self, canonical: &str) -> Option<TypeHandle> {
            self.types.get(canonical).cloned()
        }

        fn online_sessions(&self) -> Vec<Session> {
            Vec::new()
        }
    }

    fn tiny_host() -> TinyHost {
        let mut types = HashMap::new();
        for descriptor in [
            TypeDescriptor::new("Base"),
            TypeDescriptor::new("Middle").extends("Base"),
            TypeDescriptor::new("Leaf").extends("Middle"),
        ] {
            types.insert(descriptor.name.clone(), Arc::new(descriptor));
        }
        TinyHost { types }
    }

    #[test]
    fn test_assignability_walks_supertypes() {
        let host = tiny_host();
        assert!(host.is_assignable("Base", "Leaf"));
        assert!(host.is_assignable("Middle", "Leaf"));
        assert!(!host.is_assignable("Leaf", "Base"));
        assert!(host.is_assignable(types::OBJECT, "Leaf"));
        assert!(host.is_assignable("Leaf", types::NULL));
        assert!(!host.is_assignable(types::INT, types::NULL));
        assert!(!host.is_assignable(types::OBJECT, types::INT));
        assert!(host.is_assignable(&types::array_of("Base"), &types::array_of("Leaf")));
        assert!(!host.is_assignable(&types::array_of("Leaf"), &types::array_of("Base")));
        assert!(!host.is_assignable("Base", "Unknown"));
    }

    #[test]
    fn test_object_fields_default_to_null() {
        let object = HostObject::new("Leaf");
        let key = field_key("Leaf", "name");
        assert_eq!(object.get(&key), Value::Null);

        object.set(key.clone(), Value::Str("Steve".to_string()));
        assert_eq!(object.get(&key).as_str().unwrap(), "Steve");
        assert_eq!(object.type_name(), "Leaf");
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let a = HostObject::new("Leaf");
        let b = HostObject::new("Leaf");
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_value_accessors_report_mismatch() {
        let err = Value::Int(3).as_str().unwrap_err();
        assert_eq!(
            err,
            HostError::UnexpectedValue {
                expected: types::STRING.to_string(),
                actual: types::INT.to_string(),
            }
        );
        assert_eq!(
            Value::Array {
                element: "Leaf".to_string(),
                items: vec![Value::Null],
            }
            .type_name(),
            "Leaf[]"
        );
    }
}
