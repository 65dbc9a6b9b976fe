//! Boxed runtime values
//!
//! Arguments and return values cross the reflective boundary as [`Value`]s:
//! a boxed value plus the name of its runtime type. A method with no return
//! value produces the void value.

use std::any::{type_name, Any, TypeId};
use std::fmt;

use crate::error::{ArgumentError, ReflectError, ReflectResult};
use crate::types::TypeHandle;

/// A boxed value of unknown type, or void
pub struct Value {
    inner: Option<Box<dyn Any + Send>>,
    type_name: &'static str,
}

impl Value {
    /// Box a value. `()` becomes the void value.
    pub fn new<T: Any + Send>(value: T) -> Self {
        if TypeId::of::<T>() == TypeId::of::<()>() {
            return Self::void();
        }
        Self {
            inner: Some(Box::new(value)),
            type_name: type_name::<T>(),
        }
    }

    /// The "no value" sentinel
    pub fn void() -> Self {
        Self {
            inner: None,
            type_name: "()",
        }
    }

    /// Check if this is the void value
    pub fn is_void(&self) -> bool {
        self.inner.is_none()
    }

    /// Name of the runtime type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Runtime type of the value (reference form), `None` for void
    pub fn type_handle(&self) -> Option<TypeHandle> {
        self.inner
            .as_ref()
            .map(|inner| TypeHandle::from_raw((**inner).type_id(), self.type_name))
    }

    /// Check if the value is a `T`. Void is a `()`.
    pub fn is<T: Any>(&self) -> bool {
        match &self.inner {
            Some(inner) => (**inner).type_id() == TypeId::of::<T>(),
            None => TypeId::of::<T>() == TypeId::of::<()>(),
        }
    }

    /// Borrow the value as a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.as_ref()?.downcast_ref::<T>()
    }

    /// Take the value out as a `T`, handing the value back on mismatch
    pub fn downcast<T: Any>(self) -> Result<T, Value> {
        let type_name = self.type_name;
        let Some(inner) = self.inner else {
            let unit: Box<dyn Any + Send> = Box::new(());
            return match unit.downcast::<T>() {
                Ok(unit) => Ok(*unit),
                Err(_) => Err(Value::void()),
            };
        };
        match inner.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(inner) => Err(Value {
                inner: Some(inner),
                type_name,
            }),
        }
    }

    /// Take the value out as the type the caller expects
    pub fn cast<T: Any>(self) -> ReflectResult<T> {
        self.downcast::<T>()
            .map_err(|value| ReflectError::ReturnTypeMismatch {
                expected: type_name::<T>(),
                actual: value.type_name,
            })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_void() {
            f.write_str("Value(void)")
        } else {
            write!(f, "Value({})", self.type_name)
        }
    }
}

/// Build a `Vec<Value>` from a list of expressions
///
/// ```ignore
/// let args = values![3i32, Object::new()];
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::new($value)),+]
    };
}

/// Arguments handed to a method body
///
/// Arguments have already been checked against the declared parameter
/// types when a body runs; `take` and `get` still report mismatches so a
/// body that disagrees with its declaration fails cleanly.
#[derive(Debug)]
pub struct Arguments {
    values: Vec<Value>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if there are no arguments
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow argument `index` as a `T`
    pub fn get<T: Any>(&self, index: usize) -> Result<&T, ArgumentError> {
        let value = self.values.get(index).ok_or(ArgumentError::Missing(index))?;
        if value.is_void() {
            return Err(ArgumentError::Empty(index));
        }
        value
            .downcast_ref::<T>()
            .ok_or(ArgumentError::TypeMismatch {
                index,
                expected: type_name::<T>(),
                actual: value.type_name(),
            })
    }

    /// Move argument `index` out as a `T`
    pub fn take<T: Any>(&mut self, index: usize) -> Result<T, ArgumentError> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or(ArgumentError::Missing(index))?;
        if slot.is_void() {
            return Err(ArgumentError::Empty(index));
        }
        let value = std::mem::replace(slot, Value::void());
        match value.downcast::<T>() {
            Ok(value) => Ok(value),
            Err(original) => {
                let actual = original.type_name();
                self.values[index] = original;
                Err(ArgumentError::TypeMismatch {
                    index,
                    expected: type_name::<T>(),
                    actual,
                })
            }
        }
    }
}
