//! Runtime type handles
//!
//! A [`TypeHandle`] identifies a Rust type at runtime together with the form
//! it is used in. Scalar types exist in two forms:
//!
//! - **reference** form, the form every boxed [`Value`](crate::Value) has
//! - **primitive** form, used to declare unboxed scalar parameters
//!
//! The two forms never compare equal, so a method declared with a primitive
//! `i32` parameter is not found by a lookup that derives its parameter types
//! from boxed argument values.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Form a type is used in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeForm {
    /// Boxed value form (all runtime values)
    Reference,
    /// Unboxed scalar form (declared parameters only)
    Primitive,
}

/// Opaque handle identifying a type at runtime
#[derive(Clone, Copy)]
pub struct TypeHandle {
    id: TypeId,
    name: &'static str,
    form: TypeForm,
}

impl TypeHandle {
    /// Handle for the reference form of `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            form: TypeForm::Reference,
        }
    }

    /// Handle for the primitive (unboxed) form of scalar `T`
    pub fn primitive<T: Primitive>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            form: TypeForm::Primitive,
        }
    }

    pub(crate) fn from_raw(id: TypeId, name: &'static str) -> Self {
        Self {
            id,
            name,
            form: TypeForm::Reference,
        }
    }

    /// Underlying type id
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Full type path, as reported by `std::any::type_name`
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type path with generic arguments removed
    pub fn path(&self) -> &'static str {
        match self.name.find('<') {
            Some(end) => &self.name[..end],
            None => self.name,
        }
    }

    /// Form of this handle
    pub fn form(&self) -> TypeForm {
        self.form
    }

    /// Check if this is a primitive-form handle
    pub fn is_primitive(&self) -> bool {
        self.form == TypeForm::Primitive
    }

    /// Check if this handle names `T` (in either form)
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Same underlying type, ignoring form
    pub(crate) fn same_type(&self, other: &TypeHandle) -> bool {
        self.id == other.id
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.form == other.form
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.form.hash(state);
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.form {
            TypeForm::Reference => write!(f, "TypeHandle({})", self.name),
            TypeForm::Primitive => write!(f, "TypeHandle({}, primitive)", self.name),
        }
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Boxed scalars are spelled out so they can be told apart from primitives
        if self.form == TypeForm::Reference && is_scalar(self.id) {
            write!(f, "Box<{}>", self.name)
        } else {
            f.write_str(self.name)
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Scalar types that have a primitive form
pub trait Primitive: Copy + Send + Sync + 'static + sealed::Sealed {}

macro_rules! primitives {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl Primitive for $ty {}
        )*

        fn is_scalar(id: TypeId) -> bool {
            $(id == TypeId::of::<$ty>())||*
        }
    };
}

primitives!(bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// Render `name(param, ...)` for error messages and descriptors
pub(crate) fn signature(name: &str, params: &[TypeHandle]) -> String {
    let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
    format!("{}({})", name, params.join(", "))
}

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity-only value
///
/// Every `Object::new()` is equal only to itself and its clones. Useful as
/// an argument type for methods that accept "any object" and compare by
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Object {
    id: u64,
}

impl Object {
    /// Create a new object with a fresh identity
    pub fn new() -> Self {
        Self {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Identity of this object
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}
