//! Typed handles to resolved host members.
//!
//! A handle is produced once by the [`Resolver`](crate::resolver::Resolver)
//! and never re-resolved. Each one keeps the declared shape of its member so
//! callers can pick an invocation strategy at bind time.

use crate::error::InvokeError;
use crate::host::{
    field_key, ConstructorDescriptor, FieldDescriptor, Host, HostError, MethodDescriptor, TypeHandle,
    Value,
};

/// Reads and writes one declared field.
#[derive(Debug, Clone)]
pub struct FieldAccessor {
    owner: TypeHandle,
    descriptor: FieldDescriptor,
    key: String,
}

impl FieldAccessor {
    pub(crate) fn new(owner: TypeHandle, descriptor: FieldDescriptor) -> Self {
        let key = field_key(&owner.name, &descriptor.name);
        Self {
            owner,
            descriptor,
            key,
        }
    }

    fn member(&self) -> String {
        format!("{}.{}", self.owner.name, self.descriptor.name)
    }

    pub fn get(&self, target: &Value) -> Result<Value, InvokeError> {
        if self.descriptor.is_static {
            return Ok(self.owner.static_value(&self.descriptor.name));
        }
        let object = target
            .as_object()
            .map_err(|e| InvokeError::invocation(self.member(), e))?;
        Ok(object.get(&self.key))
    }

    pub fn set(&self, target: &Value, value: Value) -> Result<(), InvokeError> {
        if self.descriptor.is_static {
            self.owner.set_static_value(&self.descriptor.name, value);
            return Ok(());
        }
        let object = target
            .as_object()
            .map_err(|e| InvokeError::invocation(self.member(), e))?;
        object.set(self.key.clone(), value);
        Ok(())
    }

    /// Whether `target` is an instance of the declaring type or a subtype.
    pub fn has_field(&self, host: &dyn Host, target: &Value) -> bool {
        match target {
            Value::Object(object) => host.is_assignable(&self.owner.name, object.type_name()),
            _ => false,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn field_type(&self) -> &str {
        &self.descriptor.ty
    }

    pub fn owner(&self) -> &str {
        &self.owner.name
    }

    pub fn is_static(&self) -> bool {
        self.descriptor.is_static
    }
}

/// Calls one declared method.
#[derive(Debug, Clone)]
pub struct MethodInvoker {
    owner: String,
    descriptor: MethodDescriptor,
}

impl MethodInvoker {
    pub(crate) fn new(owner: &str, descriptor: MethodDescriptor) -> Self {
        Self {
            owner: owner.to_string(),
            descriptor,
        }
    }

    fn member(&self) -> String {
        format!(
            "{}::{}({})",
            self.owner,
            self.descriptor.name,
            self.descriptor.params.join(", ")
        )
    }

    /// Invokes the method. `target` is ignored for static methods and
    /// required otherwise.
    pub fn invoke(&self, target: Option<&Value>, args: &[Value]) -> Result<Value, InvokeError> {
        if args.len() != self.descriptor.params.len() {
            return Err(InvokeError::invocation(
                self.member(),
                HostError::Arity {
                    expected: self.descriptor.params.len(),
                    actual: args.len(),
                },
            ));
        }
        let target = if self.descriptor.is_static {
            None
        } else {
            match target {
                Some(value) if !value.is_null() => Some(value),
                _ => return Err(InvokeError::invocation(self.member(), HostError::MissingTarget)),
            }
        };
        (self.descriptor.body)(target, args).map_err(|e| InvokeError::invocation(self.member(), e))
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn return_type(&self) -> Option<&str> {
        self.descriptor.return_type.as_deref()
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.descriptor.params
    }

    pub fn is_static(&self) -> bool {
        self.descriptor.is_static
    }
}

/// Creates instances through one declared constructor.
#[derive(Debug, Clone)]
pub struct ConstructorInvoker {
    owner: String,
    descriptor: ConstructorDescriptor,
}

impl ConstructorInvoker {
    pub(crate) fn new(owner: &str, descriptor: ConstructorDescriptor) -> Self {
        Self {
            owner: owner.to_string(),
            descriptor,
        }
    }

    fn member(&self) -> String {
        format!("{}::new({})", self.owner, self.descriptor.params.join(", "))
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, InvokeError> {
        if args.len() != self.descriptor.params.len() {
            return Err(InvokeError::invocation(
                self.member(),
                HostError::Arity {
                    expected: self.descriptor.params.len(),
                    actual: args.len(),
                },
            ));
        }
        (self.descriptor.body)(args).map_err(|e| InvokeError::invocation(self.member(), e))
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.descriptor.params
    }
}
