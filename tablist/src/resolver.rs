//! Symbol resolution against the host's type catalog.
//!
//! Names may carry `{nms}`, `{obc}` and `{version}` placeholders so one
//! symbolic name covers every server revision. Members are matched by
//! position and type as well as by name, because internal names shift
//! between revisions while declaration order and types mostly do not.

use crate::error::ResolveError;
use crate::handles::{ConstructorInvoker, FieldAccessor, MethodInvoker};
use crate::host::{Host, TypeHandle, Value};
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

const CRAFT_ROOT: &str = "org.bukkit.craftbukkit";
const SERVER_ROOT: &str = "net.minecraft.server";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder pattern is valid"));

/// Values substituted for placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variables {
    pub nms: String,
    pub obc: String,
    pub version: String,
}

impl Variables {
    pub fn new(nms: impl Into<String>, obc: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            nms: nms.into(),
            obc: obc.into(),
            version: version.into(),
        }
    }

    /// Derives all three variables from the server implementation package,
    /// e.g. `org.bukkit.craftbukkit.v1_8_R3` gives `nms =
    /// net.minecraft.server.v1_8_R3` and `version = v1_8_R3`.
    pub fn from_implementation_package(package: &str) -> Self {
        Self {
            nms: package.replace(CRAFT_ROOT, SERVER_ROOT),
            obc: package.to_string(),
            version: package.replace(CRAFT_ROOT, "").replace('.', ""),
        }
    }

    fn lookup(&self, variable: &str) -> Option<&str> {
        if variable.eq_ignore_ascii_case("nms") {
            Some(&self.nms)
        } else if variable.eq_ignore_ascii_case("obc") {
            Some(&self.obc)
        } else if variable.eq_ignore_ascii_case("version") {
            Some(&self.version)
        } else {
            None
        }
    }
}

/// Resolves symbolic names into bound handles. Holds no cache: callers keep
/// the handles they resolve.
pub struct Resolver<'h> {
    host: &'h dyn Host,
    variables: Variables,
}

impl<'h> Resolver<'h> {
    pub fn new(host: &'h dyn Host) -> Self {
        let variables = Variables::from_implementation_package(&host.implementation_package());
        Self::with_variables(host, variables)
    }

    pub fn with_variables(host: &'h dyn Host, variables: Variables) -> Self {
        Self { host, variables }
    }

    pub fn host(&self) -> &'h dyn Host {
        self.host
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Expands every placeholder in `name`. Expansions are packages, so a `.`
    /// follows each one unless the name already has it there.
    pub fn expand(&self, name: &str) -> Result<String, ResolveError> {
        let mut output = String::with_capacity(name.len() + 32);
        let mut last = 0;

        for captures in PLACEHOLDER.captures_iter(name) {
            let (Some(whole), Some(variable)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let mut replacement = self
                .variables
                .lookup(variable.as_str())
                .ok_or_else(|| ResolveError::UnknownVariable(variable.as_str().to_string()))?
                .to_string();

            let next = name[whole.end()..].chars().next();
            if !replacement.is_empty() && next.is_some_and(|c| c != '.') {
                replacement.push('.');
            }

            output.push_str(&name[last..whole.start()]);
            output.push_str(&replacement);
            last = whole.end();
        }

        output.push_str(&name[last..]);
        Ok(output)
    }

    pub fn resolve_type(&self, name: &str) -> Result<TypeHandle, ResolveError> {
        let canonical = self.expand(name)?;
        self.host
            .lookup_type(&canonical)
            .ok_or(ResolveError::TypeNotFound(canonical))
    }

    /// First of `names` that resolves. Used for types that were renamed or
    /// moved between revisions.
    pub fn resolve_first_type(&self, names: &[&str]) -> Result<TypeHandle, ResolveError> {
        let mut last_error = ResolveError::TypeNotFound(names.join(" | "));
        for name in names {
            match self.resolve_type(name) {
                Ok(ty) => return Ok(ty),
                Err(e) => {
                    debug!("{} did not resolve: {}", name, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// `{nms}.name`
    pub fn minecraft_type(&self, name: &str) -> Result<TypeHandle, ResolveError> {
        self.resolve_type(&format!("{{nms}}.{}", name))
    }

    /// `{obc}.name`
    pub fn craft_type(&self, name: &str) -> Result<TypeHandle, ResolveError> {
        self.resolve_type(&format!("{{obc}}.{}", name))
    }

    fn supertype_of(&self, ty: &TypeHandle) -> Result<Option<TypeHandle>, ResolveError> {
        match &ty.supertype {
            Some(parent) => self
                .host
                .lookup_type(parent)
                .map(Some)
                .ok_or_else(|| ResolveError::TypeNotFound(parent.clone())),
            None => Ok(None),
        }
    }

    /// Selects the `index`-th declared field (0-based, declaration order)
    /// whose name matches (when given) and whose declared type is assignable
    /// to `field_type`. Unmatched occurrences carry over into the supertype.
    pub fn resolve_field(
        &self,
        ty: &TypeHandle,
        name: Option<&str>,
        field_type: &str,
        index: usize,
    ) -> Result<FieldAccessor, ResolveError> {
        let mut remaining = index;
        let mut current = Some(ty.clone());

        while let Some(owner) = current {
            for field in &owner.fields {
                let name_matches = name.map_or(true, |n| field.name == n);
                if name_matches && self.host.is_assignable(field_type, &field.ty) {
                    if remaining == 0 {
                        return Ok(FieldAccessor::new(owner.clone(), field.clone()));
                    }
                    remaining -= 1;
                }
            }
            current = self.supertype_of(&owner)?;
        }

        Err(ResolveError::FieldNotFound {
            owner: ty.name.clone(),
            name: name.map(str::to_string),
            field_type: field_type.to_string(),
            index,
        })
    }

    /// Finds a method by name, return type and exact parameter list. Only the
    /// type's own methods are searched unless `search_supertypes` is set.
    pub fn resolve_method(
        &self,
        ty: &TypeHandle,
        name: Option<&str>,
        return_type: Option<&str>,
        search_supertypes: bool,
        params: &[&str],
    ) -> Result<MethodInvoker, ResolveError> {
        let mut current = Some(ty.clone());

        while let Some(owner) = current {
            let found = owner.methods.iter().find(|method| {
                name.map_or(true, |n| method.name == n)
                    && return_type.map_or(true, |rt| method.return_type.as_deref() == Some(rt))
                    && method.params.iter().map(String::as_str).eq(params.iter().copied())
            });
            if let Some(method) = found {
                return Ok(MethodInvoker::new(&owner.name, method.clone()));
            }
            current = if search_supertypes {
                self.supertype_of(&owner)?
            } else {
                None
            };
        }

        Err(ResolveError::MethodNotFound {
            owner: ty.name.clone(),
            name: name.map(str::to_string),
            params: params.iter().map(|p| p.to_string()).collect(),
        })
    }

    pub fn resolve_constructor(
        &self,
        ty: &TypeHandle,
        params: &[&str],
    ) -> Result<ConstructorInvoker, ResolveError> {
        ty.constructors
            .iter()
            .find(|ctor| ctor.params.iter().map(String::as_str).eq(params.iter().copied()))
            .map(|ctor| ConstructorInvoker::new(&ty.name, ctor.clone()))
            .ok_or_else(|| ResolveError::ConstructorNotFound {
                owner: ty.name.clone(),
                shape: format!("({})", params.join(", ")),
            })
    }

    /// Constructor by declaration position, for when parameter types cannot
    /// be named reliably across revisions.
    pub fn resolve_constructor_by_index(
        &self,
        ty: &TypeHandle,
        index: usize,
    ) -> Result<ConstructorInvoker, ResolveError> {
        ty.constructors
            .get(index)
            .map(|ctor| ConstructorInvoker::new(&ty.name, ctor.clone()))
            .ok_or_else(|| ResolveError::ConstructorNotFound {
                owner: ty.name.clone(),
                shape: format!("#{}", index),
            })
    }

    /// Looks up a named enum constant. Constant sets drift between revisions
    /// more than types do, so absence is not an error here.
    pub fn resolve_enum_constant(&self, ty: &TypeHandle, name: &str) -> Option<Value> {
        ty.enum_constants
            .iter()
            .find(|constant| constant.as_str() == name)
            .map(|constant| Value::Enum {
                owner: ty.name.clone(),
                constant: constant.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{types, Session, TypeDescriptor};
    use std::collections::HashMap;
    use std::sync::Arc;

    struct CatalogHost {
        types: HashMap<String, TypeHandle>,
    }

    impl CatalogHost {
        fn new(descriptors: Vec<TypeDescriptor>) -> Self {
            let types = descriptors
                .into_iter()
                .map(|d| (d.name.clone(), Arc::new(d)))
                .collect();
            Self { types }
        }
    }

    impl Host for CatalogHost {
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

    fn catalog() -> CatalogHost {
        CatalogHost::new(vec![
            TypeDescriptor::new("a.b.Foo"),
            TypeDescriptor::new("a.b.Component"),
            TypeDescriptor::new("a.b.Text").extends("a.b.Component"),
            TypeDescriptor::new("a.b.Base")
                .field("base0", "a.b.Text")
                .field("baseCount", types::INT)
                .field("base1", "a.b.Component")
                .method("describe", Some(types::STRING), &[], |_, _| {
                    Ok(Value::Str("base".to_string()))
                }),
            TypeDescriptor::new("a.b.Derived")
                .extends("a.b.Base")
                .field("own0", "a.b.Component")
                .field("count", types::INT)
                .field("own1", "a.b.Text")
                .method("size", Some(types::INT), &[], |_, _| Ok(Value::Int(1)))
                .method("put", Some(types::BOOL), &[types::OBJECT, types::OBJECT], |_, _| {
                    Ok(Value::Bool(true))
                })
                .constructor(&[], |_| Ok(Value::Null))
                .constructor(&[types::STRING, types::INT], |_| Ok(Value::Null)),
            TypeDescriptor::new("a.b.Mode").constants(&["NOT_SET", "SURVIVAL"]),
        ])
    }

    fn resolver(host: &CatalogHost) -> Resolver<'_> {
        Resolver::with_variables(host, Variables::new("a.b", "c.d", "v1"))
    }

    #[test]
    fn test_variables_from_implementation_package() {
        let vars = Variables::from_implementation_package("org.bukkit.craftbukkit.v1_8_R3");
        assert_eq!(vars.nms, "net.minecraft.server.v1_8_R3");
        assert_eq!(vars.obc, "org.bukkit.craftbukkit.v1_8_R3");
        assert_eq!(vars.version, "v1_8_R3");
    }

    #[test]
    fn test_expand_placeholders() {
        let host = catalog();
        let resolver = resolver(&host);

        assert_eq!(resolver.expand("{nms}.Foo").unwrap(), "a.b.Foo");
        assert_eq!(resolver.expand("{nms}Foo").unwrap(), "a.b.Foo");
        assert_eq!(resolver.expand("{NMS}.Foo").unwrap(), "a.b.Foo");
        assert_eq!(resolver.expand("{obc}.entity.Player").unwrap(), "c.d.entity.Player");
        assert_eq!(resolver.expand("x.{version}").unwrap(), "x.v1");
        assert_eq!(resolver.expand("plain.Name").unwrap(), "plain.Name");
        assert_eq!(
            resolver.expand("{bogus}.Foo"),
            Err(ResolveError::UnknownVariable("bogus".to_string()))
        );
    }

    #[test]
    fn test_empty_expansion_adds_no_separator() {
        let host = catalog();
        let resolver = Resolver::with_variables(&host, Variables::new("", "c.d", "v1"));
        assert_eq!(resolver.expand("{nms}Foo").unwrap(), "Foo");
    }

    #[test]
    fn test_resolve_type() {
        let host = catalog();
        let resolver = resolver(&host);

        assert_eq!(resolver.resolve_type("{nms}.Foo").unwrap().name, "a.b.Foo");
        assert_eq!(resolver.minecraft_type("Foo").unwrap().name, "a.b.Foo");
        assert_eq!(
            resolver.resolve_type("{nms}.Missing").unwrap_err(),
            ResolveError::TypeNotFound("a.b.Missing".to_string())
        );
        assert!(matches!(
            resolver.resolve_type("{bogus}.Foo"),
            Err(ResolveError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_resolve_first_type() {
        let host = catalog();
        let resolver = resolver(&host);

        let ty = resolver
            .resolve_first_type(&["{nms}.Renamed", "{nms}.Foo"])
            .unwrap();
        assert_eq!(ty.name, "a.b.Foo");
        assert_eq!(
            resolver.resolve_first_type(&["{nms}.X", "{nms}.Y"]).unwrap_err(),
            ResolveError::TypeNotFound("a.b.Y".to_string())
        );
    }

    #[test]
    fn test_resolve_field_by_position() {
        let host = catalog();
        let resolver = resolver(&host);
        let derived = resolver.resolve_type("{nms}.Derived").unwrap();

        // Own fields assignable to Component: own0, own1
        let first = resolver.resolve_field(&derived, None, "a.b.Component", 0).unwrap();
        assert_eq!(first.name(), "own0");
        let second = resolver.resolve_field(&derived, None, "a.b.Component", 1).unwrap();
        assert_eq!(second.name(), "own1");
        assert_eq!(second.field_type(), "a.b.Text");

        // Third and fourth matches come from the supertype
        let third = resolver.resolve_field(&derived, None, "a.b.Component", 2).unwrap();
        assert_eq!(third.name(), "base0");
        assert_eq!(third.owner(), "a.b.Base");
        let fourth = resolver.resolve_field(&derived, None, "a.b.Component", 3).unwrap();
        assert_eq!(fourth.name(), "base1");

        assert!(matches!(
            resolver.resolve_field(&derived, None, "a.b.Component", 4),
            Err(ResolveError::FieldNotFound { index: 4, .. })
        ));
    }

    #[test]
    fn test_resolve_field_by_name() {
        let host = catalog();
        let resolver = resolver(&host);
        let derived = resolver.resolve_type("{nms}.Derived").unwrap();

        let count = resolver.resolve_field(&derived, Some("count"), types::INT, 0).unwrap();
        assert_eq!(count.owner(), "a.b.Derived");
        let inherited = resolver
            .resolve_field(&derived, Some("baseCount"), types::INT, 0)
            .unwrap();
        assert_eq!(inherited.owner(), "a.b.Base");
        let any = resolver.resolve_field(&derived, Some("own1"), types::OBJECT, 0).unwrap();
        assert_eq!(any.name(), "own1");
        assert!(resolver
            .resolve_field(&derived, Some("count"), types::STRING, 0)
            .is_err());
    }

    #[test]
    fn test_resolve_method() {
        let host = catalog();
        let resolver = resolver(&host);
        let derived = resolver.resolve_type("{nms}.Derived").unwrap();

        let put = resolver
            .resolve_method(&derived, Some("put"), None, false, &[types::OBJECT, types::OBJECT])
            .unwrap();
        assert_eq!(put.parameter_types().len(), 2);
        assert_eq!(put.return_type(), Some(types::BOOL));

        // Arity must match exactly
        assert!(resolver
            .resolve_method(&derived, Some("put"), None, false, &[types::OBJECT])
            .is_err());
        // Return type filter
        assert!(resolver
            .resolve_method(&derived, Some("size"), Some(types::STRING), false, &[])
            .is_err());
        // Unnamed lookup by shape alone
        let by_shape = resolver
            .resolve_method(&derived, None, Some(types::INT), false, &[])
            .unwrap();
        assert_eq!(by_shape.name(), "size");
    }

    #[test]
    fn test_resolve_method_supertype_search_is_opt_in() {
        let host = catalog();
        let resolver = resolver(&host);
        let derived = resolver.resolve_type("{nms}.Derived").unwrap();

        assert!(matches!(
            resolver.resolve_method(&derived, Some("describe"), None, false, &[]),
            Err(ResolveError::MethodNotFound { .. })
        ));
        let describe = resolver
            .resolve_method(&derived, Some("describe"), None, true, &[])
            .unwrap();
        assert_eq!(
            describe.invoke(Some(&Value::Int(0)), &[]).unwrap(),
            Value::Str("base".to_string())
        );
    }

    #[test]
    fn test_resolve_constructors() {
        let host = catalog();
        let resolver = resolver(&host);
        let derived = resolver.resolve_type("{nms}.Derived").unwrap();

        let exact = resolver
            .resolve_constructor(&derived, &[types::STRING, types::INT])
            .unwrap();
        assert_eq!(exact.parameter_types().len(), 2);
        let by_index = resolver.resolve_constructor_by_index(&derived, 0).unwrap();
        assert!(by_index.parameter_types().is_empty());

        assert_eq!(
            resolver.resolve_constructor(&derived, &[types::INT]).unwrap_err(),
            ResolveError::ConstructorNotFound {
                owner: "a.b.Derived".to_string(),
                shape: "(int)".to_string(),
            }
        );
        assert!(matches!(
            resolver.resolve_constructor_by_index(&derived, 2),
            Err(ResolveError::ConstructorNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_enum_constant() {
        let host = catalog();
        let resolver = resolver(&host);
        let mode = resolver.resolve_type("{nms}.Mode").unwrap();

        assert_eq!(
            resolver.resolve_enum_constant(&mode, "SURVIVAL"),
            Some(Value::Enum {
                owner: "a.b.Mode".to_string(),
                constant: "SURVIVAL".to_string(),
            })
        );
        assert_eq!(resolver.resolve_enum_constant(&mode, "SPECTATOR"), None);
    }
}
