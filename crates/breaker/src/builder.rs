//! Declaring a type's methods
//!
//! Types are declared either by hand through [`TypeBuilder`], or by placing
//! `#[reflect]` on an inherent `impl` block, which generates a [`Reflected`]
//! implementation calling the same builder.
//!
//! ```ignore
//! registry.register_with::<Stack, _>(|ty| {
//!     ty.method(
//!         MethodDecl::new("push").param(TypeHandle::of::<String>()),
//!         |this: &mut Stack, args: &mut Arguments| {
//!             this.items.push(args.take::<String>(0)?);
//!             Ok(Value::void())
//!         },
//!     )
//! });
//! ```

use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::BoxError;
use crate::metadata::{MethodBody, MethodInfo, TypeInfo, Visibility};
use crate::types::TypeHandle;
use crate::value::{Arguments, Value};

/// Types that can declare their own methods
pub trait Reflected: Any + Sized {
    /// Declare this type's methods on the builder
    fn declare(builder: TypeBuilder<Self>) -> TypeBuilder<Self>;
}

/// Declaration of a method's name, visibility and signature
#[derive(Debug, Clone)]
pub struct MethodDecl {
    name: String,
    visibility: Visibility,
    parameters: Vec<TypeHandle>,
    return_type: Option<TypeHandle>,
}

impl MethodDecl {
    /// Private method with no parameters and no return value
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Private,
            parameters: Vec::new(),
            return_type: None,
        }
    }

    /// Set the visibility
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Shorthand for `visibility(Visibility::Public)`
    pub fn public(self) -> Self {
        self.visibility(Visibility::Public)
    }

    /// Append a parameter type
    pub fn param(mut self, parameter: TypeHandle) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set the return type
    pub fn returns(mut self, return_type: TypeHandle) -> Self {
        self.return_type = Some(return_type);
        self
    }

    fn into_info(self, declaring_type: TypeHandle, is_static: bool, body: MethodBody) -> MethodInfo {
        MethodInfo {
            name: self.name,
            declaring_type,
            parameters: self.parameters,
            return_type: self.return_type,
            visibility: self.visibility,
            is_static,
            body,
        }
    }
}

/// Builder collecting the declared methods of `T`
pub struct TypeBuilder<T> {
    info: TypeInfo,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any> TypeBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            info: TypeInfo::new(TypeHandle::of::<T>()),
            _marker: PhantomData,
        }
    }

    /// Record `P` as the superclass. Lookup never searches it.
    pub fn extends<P: ?Sized + 'static>(mut self) -> Self {
        self.info.set_superclass(TypeHandle::of::<P>());
        self
    }

    /// Declare an instance method
    pub fn method<F>(mut self, decl: MethodDecl, body: F) -> Self
    where
        F: Fn(&mut T, &mut Arguments) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        let body: MethodBody = Arc::new(
            move |receiver: Option<&mut dyn Any>, args: &mut Arguments| -> Result<Value, BoxError> {
                let this = receiver
                    .and_then(|receiver| receiver.downcast_mut::<T>())
                    .ok_or_else(|| format!("receiver is not a {}", type_name::<T>()))?;
                body(this, args)
            },
        );
        self.info
            .add_method(decl.into_info(self.info.handle(), false, body));
        self
    }

    /// Declare a static method
    pub fn static_method<F>(mut self, decl: MethodDecl, body: F) -> Self
    where
        F: Fn(&mut Arguments) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        let body: MethodBody = Arc::new(
            move |_receiver: Option<&mut dyn Any>, args: &mut Arguments| -> Result<Value, BoxError> {
                body(args)
            },
        );
        self.info
            .add_method(decl.into_info(self.info.handle(), true, body));
        self
    }

    pub(crate) fn build(self) -> TypeInfo {
        self.info
    }
}
