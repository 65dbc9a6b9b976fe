//! Reflective accessor
//!
//! [`Breaker`] finds methods declared directly on a type and hands back
//! descriptors that ignore visibility, subject to its [`AccessPolicy`].
//!
//! Lookup is exact. Parameter types must match the declaration exactly,
//! including primitive versus reference form, and ancestors are never
//! searched. [`Breaker::invoke`] derives the parameter types from the
//! runtime types of its arguments, which are always in reference form: a
//! method with primitive parameters can only be reached by resolving it
//! with [`Breaker::declared_method`] and invoking the descriptor.

use std::any::Any;
use std::sync::Arc;

use crate::error::{ReflectError, ReflectResult};
use crate::method::Method;
use crate::permissions::AccessPolicy;
use crate::registry::TypeRegistry;
use crate::types::{signature, TypeHandle};
use crate::value::Value;

/// Locates and invokes declared methods, bypassing visibility
///
/// Holds no mutable state: every call is an independent lookup against the
/// shared registry. Callers wanting to skip repeated lookups keep the
/// returned [`Method`] themselves.
#[derive(Debug, Clone)]
pub struct Breaker {
    registry: Arc<TypeRegistry>,
    policy: Arc<AccessPolicy>,
}

impl Breaker {
    /// Create an accessor with a permissive policy
    pub fn new(registry: impl Into<Arc<TypeRegistry>>) -> Self {
        Self::with_policy(registry, AccessPolicy::permissive())
    }

    /// Create an accessor governed by `policy`
    pub fn with_policy(
        registry: impl Into<Arc<TypeRegistry>>,
        policy: impl Into<Arc<AccessPolicy>>,
    ) -> Self {
        Self {
            registry: registry.into(),
            policy: policy.into(),
        }
    }

    /// Registry searched by this accessor
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Policy governing visibility overrides
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Find the method declared on `ty` with exactly this name and parameter list
    ///
    /// Fails with [`ReflectError::NotFound`] if there is no such method and
    /// with [`ReflectError::AccessDenied`] if the policy forbids overriding
    /// its visibility.
    pub fn declared_method(
        &self,
        ty: TypeHandle,
        name: &str,
        parameters: &[TypeHandle],
    ) -> ReflectResult<Method> {
        self.declared_method_opt(ty, name, parameters)?
            .ok_or_else(|| ReflectError::NotFound {
                type_name: ty.name().to_string(),
                signature: signature(name, parameters),
            })
    }

    /// Like [`declared_method`](Self::declared_method), but `Ok(None)` when nothing matches
    ///
    /// Still fails with [`ReflectError::AccessDenied`].
    pub fn declared_method_opt(
        &self,
        ty: TypeHandle,
        name: &str,
        parameters: &[TypeHandle],
    ) -> ReflectResult<Option<Method>> {
        match self.registry.declared_method(ty, name, parameters) {
            Some(method) => self.make_accessible(method).map(Some),
            None => Ok(None),
        }
    }

    fn make_accessible(&self, mut method: Method) -> ReflectResult<Method> {
        let visibility = method.visibility();
        if !self.policy.allows(method.declaring_type(), visibility) {
            return Err(ReflectError::AccessDenied {
                type_name: method.declaring_type().name().to_string(),
                signature: method.signature(),
                visibility,
            });
        }
        method.set_accessible();
        tracing::trace!(method = %method, "resolved declared method");
        Ok(method)
    }

    /// Find and invoke a method on `receiver`, casting the result to `T`
    ///
    /// Methods without a return value produce `()`. Parameter types come
    /// from the runtime types of `args`, so only methods whose parameters
    /// are exactly those types, in reference form, can be found.
    ///
    /// `receiver` must be the registered value itself. Passing a
    /// `&mut Box<dyn Any>` makes the box the receiver, which is never
    /// registered and fails with [`ReflectError::NotFound`]; pass
    /// `&mut *boxed` instead.
    pub fn invoke<T: Any>(
        &self,
        receiver: &mut dyn Any,
        name: &str,
        args: Vec<Value>,
    ) -> ReflectResult<T> {
        self.invoke_value(receiver, name, args)?.cast::<T>()
    }

    /// Find and invoke a method on `receiver`, returning the raw result
    pub fn invoke_value(
        &self,
        receiver: &mut dyn Any,
        name: &str,
        args: Vec<Value>,
    ) -> ReflectResult<Value> {
        let parameters = args
            .iter()
            .enumerate()
            .map(|(index, arg)| {
                arg.type_handle().ok_or_else(|| {
                    ReflectError::IllegalArgument(format!(
                        "argument {} is void and has no runtime type",
                        index
                    ))
                })
            })
            .collect::<ReflectResult<Vec<_>>>()?;

        let receiver_id = (*receiver).type_id();
        let Some(info) = self.registry.get_by_id(receiver_id) else {
            return Err(ReflectError::NotFound {
                type_name: receiver_label(receiver),
                signature: signature(name, &parameters),
            });
        };

        let method = self.declared_method(info.handle(), name, &parameters)?;
        method.invoke(receiver, args)
    }
}

/// Describe a receiver whose type is not registered
///
/// `dyn Any` carries no type name, so only boxes are recognised by name.
fn receiver_label(receiver: &dyn Any) -> String {
    const UNBOX: &str = "pass `&mut *boxed` to reach the boxed value";
    if receiver.is::<Box<dyn Any>>() {
        format!("Box<dyn Any> ({})", UNBOX)
    } else if receiver.is::<Box<dyn Any + Send>>() {
        format!("Box<dyn Any + Send> ({})", UNBOX)
    } else {
        format!("unregistered receiver type {:?}", (*receiver).type_id())
    }
}
