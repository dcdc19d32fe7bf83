//! Descriptors of host types and their members.

use super::{HostError, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type MethodBody = Arc<dyn Fn(Option<&Value>, &[Value]) -> Result<Value, HostError> + Send + Sync>;
pub type ConstructorBody = Arc<dyn Fn(&[Value]) -> Result<Value, HostError> + Send + Sync>;
pub type TypeHandle = Arc<TypeDescriptor>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: String,
    pub is_static: bool,
}

#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: String,
    /// `None` for methods that return nothing.
    pub return_type: Option<String>,
    pub params: Vec<String>,
    pub is_static: bool,
    pub body: MethodBody,
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("params", &self.params)
            .field("is_static", &self.is_static)
            .finish()
    }
}

#[derive(Clone)]
pub struct ConstructorDescriptor {
    pub params: Vec<String>,
    pub body: ConstructorBody,
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("params", &self.params)
            .finish()
    }
}

/// A host type: its place in the hierarchy and its own declared members, in
/// declaration order. Inherited members live on the supertype's descriptor.
#[derive(Debug)]
pub struct TypeDescriptor {
    pub name: String,
    pub supertype: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub methods: Vec<MethodDescriptor>,
    pub constructors: Vec<ConstructorDescriptor>,
    pub enum_constants: Vec<String>,
    statics: Mutex<HashMap<String, Value>>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertype: None,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            enum_constants: Vec::new(),
            statics: Mutex::new(HashMap::new()),
        }
    }

    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            ty: ty.into(),
            is_static: false,
        });
        self
    }

    pub fn static_field(mut self, name: impl Into<String>, ty: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        self.statics.lock().insert(name.clone(), value);
        self.fields.push(FieldDescriptor {
            name,
            ty: ty.into(),
            is_static: true,
        });
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, return_type: Option<&str>, params: &[&str], body: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.methods.push(MethodDescriptor {
            name: name.into(),
            return_type: return_type.map(str::to_string),
            params: params.iter().map(|p| p.to_string()).collect(),
            is_static: false,
            body: Arc::new(body),
        });
        self
    }

    /// A method invoked without a receiver; the body always sees `None`.
    pub fn static_method<F>(
        mut self,
        name: impl Into<String>,
        return_type: Option<&str>,
        params: &[&str],
        body: F,
    ) -> Self
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.methods.push(MethodDescriptor {
            name: name.into(),
            return_type: return_type.map(str::to_string),
            params: params.iter().map(|p| p.to_string()).collect(),
            is_static: true,
            body: Arc::new(body),
        });
        self
    }

    pub fn constructor<F>(mut self, params: &[&str], body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.constructors.push(ConstructorDescriptor {
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Arc::new(body),
        });
        self
    }

    pub fn constants(mut self, names: &[&str]) -> Self {
        self.enum_constants.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn is_enum(&self) -> bool {
        !self.enum_constants.is_empty()
    }

    pub fn static_value(&self, name: &str) -> Value {
        self.statics.lock().get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn set_static_value(&self, name: &str, value: Value) {
        self.statics.lock().insert(name.to_string(), value);
    }
}
