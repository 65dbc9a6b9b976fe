//! Registry of reflected types
//!
//! Built up front, then shared read-only (typically behind an `Arc`) by
//! every [`Breaker`](crate::Breaker) that searches it.

use std::any::{Any, TypeId};

use rustc_hash::FxHashMap;

use crate::builder::{Reflected, TypeBuilder};
use crate::metadata::TypeInfo;
use crate::method::Method;
use crate::types::TypeHandle;

/// Registry of type metadata, indexed by type id
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: FxHashMap<TypeId, TypeInfo>,
}

impl TypeRegistry {
    /// Create new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type that declares its own methods
    pub fn register<T: Reflected>(&mut self) -> &mut Self {
        self.register_with::<T, _>(T::declare)
    }

    /// Register a type, declaring its methods with `declare`
    ///
    /// Registering a type again replaces its previous metadata.
    pub fn register_with<T, F>(&mut self, declare: F) -> &mut Self
    where
        T: Any,
        F: FnOnce(TypeBuilder<T>) -> TypeBuilder<T>,
    {
        let info = declare(TypeBuilder::new()).build();
        tracing::debug!(
            type_name = info.name(),
            methods = info.method_count(),
            "registered reflected type"
        );
        self.types.insert(TypeId::of::<T>(), info);
        self
    }

    /// Get metadata for a type
    ///
    /// Primitive-form handles declare nothing and never resolve.
    pub fn get(&self, ty: TypeHandle) -> Option<&TypeInfo> {
        if ty.is_primitive() {
            return None;
        }
        self.types.get(&ty.type_id())
    }

    /// Get metadata by raw type id
    pub fn get_by_id(&self, id: TypeId) -> Option<&TypeInfo> {
        self.types.get(&id)
    }

    /// Check if a type is registered
    pub fn contains(&self, ty: TypeHandle) -> bool {
        self.get(ty).is_some()
    }

    /// Find a method declared directly on `ty` with exactly this name and parameter list
    ///
    /// The descriptor is not accessible; use [`Breaker`](crate::Breaker) to
    /// obtain one that may invoke non-public methods.
    pub fn declared_method(
        &self,
        ty: TypeHandle,
        name: &str,
        parameters: &[TypeHandle],
    ) -> Option<Method> {
        self.get(ty)?.declared_method(name, parameters)
    }

    /// All methods declared directly on `ty`
    pub fn declared_methods(&self, ty: TypeHandle) -> Vec<Method> {
        self.get(ty)
            .map(|info| info.declared_methods().collect())
            .unwrap_or_default()
    }

    /// All registered types, in no particular order
    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }

    /// Get number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
