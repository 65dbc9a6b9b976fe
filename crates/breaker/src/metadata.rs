//! Declared-method metadata
//!
//! Stores the reflection metadata of a registered type: its handle, the
//! superclass it declares (informational only, lookup never walks it) and
//! the methods declared directly on it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::BoxError;
use crate::method::Method;
use crate::permissions::ReflectionPermission;
use crate::types::TypeHandle;
use crate::value::{Arguments, Value};

/// Declared visibility of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// `pub`
    Public,
    /// Visible to subtypes
    Protected,
    /// `pub(crate)`, `pub(super)`, `pub(in ..)`
    Package,
    /// No visibility modifier
    Private,
}

impl Visibility {
    /// Check if the method is callable without overriding visibility
    pub fn is_public(&self) -> bool {
        *self == Visibility::Public
    }

    /// Permission needed to make a method of this visibility accessible
    pub fn required_permission(&self) -> ReflectionPermission {
        match self {
            Visibility::Public => ReflectionPermission::INVOKE_PUBLIC,
            Visibility::Protected => ReflectionPermission::INVOKE_PROTECTED,
            Visibility::Package => ReflectionPermission::INVOKE_PACKAGE,
            Visibility::Private => ReflectionPermission::INVOKE_PRIVATE,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Package => "package",
            Visibility::Private => "private",
        };
        f.write_str(s)
    }
}

/// Type-erased method body. Static methods receive no receiver.
pub(crate) type MethodBody = Arc<
    dyn Fn(Option<&mut dyn Any>, &mut Arguments) -> Result<Value, BoxError> + Send + Sync,
>;

/// Metadata for a single declared method
pub(crate) struct MethodInfo {
    pub(crate) name: String,
    pub(crate) declaring_type: TypeHandle,
    pub(crate) parameters: Vec<TypeHandle>,
    pub(crate) return_type: Option<TypeHandle>,
    pub(crate) visibility: Visibility,
    pub(crate) is_static: bool,
    pub(crate) body: MethodBody,
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .field("visibility", &self.visibility)
            .field("is_static", &self.is_static)
            .finish_non_exhaustive()
    }
}

/// Reflection metadata for a single type
#[derive(Debug, Clone)]
pub struct TypeInfo {
    handle: TypeHandle,
    superclass: Option<TypeHandle>,
    /// Declared methods in declaration order
    methods: Vec<Arc<MethodInfo>>,
    /// Method name to indices of its overloads
    method_indices: FxHashMap<String, Vec<usize>>,
}

impl TypeInfo {
    pub(crate) fn new(handle: TypeHandle) -> Self {
        Self {
            handle,
            superclass: None,
            methods: Vec::new(),
            method_indices: FxHashMap::default(),
        }
    }

    /// Handle of the described type
    pub fn handle(&self) -> TypeHandle {
        self.handle
    }

    /// Type path of the described type
    pub fn name(&self) -> &'static str {
        self.handle.name()
    }

    /// Declared superclass, if any
    pub fn superclass(&self) -> Option<TypeHandle> {
        self.superclass
    }

    pub(crate) fn set_superclass(&mut self, superclass: TypeHandle) {
        self.superclass = Some(superclass);
    }

    /// Add a method, replacing any method with the same name and parameter list
    pub(crate) fn add_method(&mut self, info: MethodInfo) {
        let overloads = self.method_indices.entry(info.name.clone()).or_default();
        let existing = overloads
            .iter()
            .copied()
            .find(|&index| self.methods[index].parameters == info.parameters);

        match existing {
            Some(index) => self.methods[index] = Arc::new(info),
            None => {
                overloads.push(self.methods.len());
                self.methods.push(Arc::new(info));
            }
        }
    }

    /// Find the method declared on this type with exactly this name and parameter list
    ///
    /// The returned descriptor is not accessible: invoking it only succeeds
    /// for public methods.
    pub fn declared_method(&self, name: &str, parameters: &[TypeHandle]) -> Option<Method> {
        self.method_indices
            .get(name)?
            .iter()
            .map(|&index| &self.methods[index])
            .find(|info| info.parameters == parameters)
            .map(|info| Method::new(Arc::clone(info)))
    }

    /// All methods declared on this type, in declaration order
    pub fn declared_methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.methods.iter().map(|info| Method::new(Arc::clone(info)))
    }

    /// Check if a method with this name is declared (any overload)
    pub fn has_method(&self, name: &str) -> bool {
        self.method_indices.contains_key(name)
    }

    /// Number of declared methods
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, parameters: Vec<TypeHandle>, visibility: Visibility) -> MethodInfo {
        MethodInfo {
            name: name.to_string(),
            declaring_type: TypeHandle::of::<String>(),
            parameters,
            return_type: None,
            visibility,
            is_static: true,
            body: Arc::new(|_: Option<&mut dyn Any>, _: &mut Arguments| Ok(Value::void())),
        }
    }

    #[test]
    fn test_overloads_by_parameter_list() {
        let mut meta = TypeInfo::new(TypeHandle::of::<String>());
        meta.add_method(info("push", vec![TypeHandle::of::<char>()], Visibility::Public));
        meta.add_method(info("push", vec![TypeHandle::primitive::<char>()], Visibility::Private));

        assert_eq!(meta.method_count(), 2);
        assert!(meta.has_method("push"));
        assert!(!meta.has_method("pop"));

        let boxed = meta.declared_method("push", &[TypeHandle::of::<char>()]).unwrap();
        assert_eq!(boxed.visibility(), Visibility::Public);

        let primitive = meta
            .declared_method("push", &[TypeHandle::primitive::<char>()])
            .unwrap();
        assert_eq!(primitive.visibility(), Visibility::Private);

        assert!(meta.declared_method("push", &[]).is_none());
    }

    #[test]
    fn test_redeclaration_replaces() {
        let mut meta = TypeInfo::new(TypeHandle::of::<String>());
        meta.add_method(info("len", vec![], Visibility::Private));
        meta.add_method(info("len", vec![], Visibility::Public));

        assert_eq!(meta.method_count(), 1);
        assert_eq!(
            meta.declared_method("len", &[]).unwrap().visibility(),
            Visibility::Public
        );
    }

    #[test]
    fn test_visibility_permissions() {
        assert!(Visibility::Public.is_public());
        assert!(!Visibility::Package.is_public());
        assert_eq!(
            Visibility::Private.required_permission(),
            ReflectionPermission::INVOKE_PRIVATE
        );
        assert_eq!(Visibility::Protected.to_string(), "protected");
    }
}
