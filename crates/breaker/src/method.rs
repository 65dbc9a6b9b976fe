//! Resolved method descriptors

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{Panicked, ReflectError, ReflectResult};
use crate::metadata::{MethodInfo, Visibility};
use crate::types::{signature, TypeHandle};
use crate::value::{Arguments, Value};

/// Handle to one declared method
///
/// Cheap to clone and safe to share across threads. A descriptor can be
/// invoked any number of times against different receivers and arguments.
#[derive(Debug, Clone)]
pub struct Method {
    info: Arc<MethodInfo>,
    accessible: bool,
}

impl Method {
    pub(crate) fn new(info: Arc<MethodInfo>) -> Self {
        Self {
            info,
            accessible: false,
        }
    }

    pub(crate) fn set_accessible(&mut self) {
        self.accessible = true;
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Type the method is declared on
    pub fn declaring_type(&self) -> TypeHandle {
        self.info.declaring_type
    }

    /// Declared parameter types, in order
    pub fn parameter_types(&self) -> &[TypeHandle] {
        &self.info.parameters
    }

    /// Declared return type, `None` for methods without a return value
    pub fn return_type(&self) -> Option<TypeHandle> {
        self.info.return_type
    }

    /// Declared visibility
    pub fn visibility(&self) -> Visibility {
        self.info.visibility
    }

    /// Check if the method takes no receiver
    pub fn is_static(&self) -> bool {
        self.info.is_static
    }

    /// Check if visibility checks are suppressed for this descriptor
    pub fn is_accessible(&self) -> bool {
        self.accessible
    }

    /// `name(param, ...)`
    pub fn signature(&self) -> String {
        signature(&self.info.name, &self.info.parameters)
    }

    /// Invoke on `receiver`. Static methods ignore the receiver.
    ///
    /// An error or panic in the body comes back as
    /// [`ReflectError::InvocationFailed`]. A caught panic is still reported
    /// by the process's panic hook, which prints it to stderr unless the
    /// hook has been replaced with [`std::panic::set_hook`].
    pub fn invoke(&self, receiver: &mut dyn Any, args: Vec<Value>) -> ReflectResult<Value> {
        self.call(Some(receiver), args)
    }

    /// Invoke a static method
    pub fn invoke_static(&self, args: Vec<Value>) -> ReflectResult<Value> {
        self.call(None, args)
    }

    fn call(&self, receiver: Option<&mut dyn Any>, args: Vec<Value>) -> ReflectResult<Value> {
        let info = &*self.info;

        if !self.accessible && !info.visibility.is_public() {
            return Err(ReflectError::AccessDenied {
                type_name: info.declaring_type.name().to_string(),
                signature: self.signature(),
                visibility: info.visibility,
            });
        }

        let receiver = if info.is_static {
            None
        } else {
            let receiver = receiver.ok_or_else(|| {
                ReflectError::IllegalArgument(format!(
                    "{} is an instance method and needs a receiver",
                    self.signature()
                ))
            })?;
            if (*receiver).type_id() != info.declaring_type.type_id() {
                return Err(ReflectError::IllegalArgument(format!(
                    "receiver is not an instance of {}",
                    info.declaring_type.name()
                )));
            }
            Some(receiver)
        };

        self.check_arguments(&args)?;

        tracing::trace!(method = %self, "invoking declared method");

        let mut args = Arguments::new(args);
        let outcome = catch_unwind(AssertUnwindSafe(|| (info.body)(receiver, &mut args)));
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(ReflectError::InvocationFailed {
                signature: self.signature(),
                source,
            }),
            Err(payload) => Err(ReflectError::InvocationFailed {
                signature: self.signature(),
                source: Box::new(Panicked::from_payload(payload)),
            }),
        }
    }

    /// Boxed arguments unbox into primitive parameters, so only the type is compared here
    fn check_arguments(&self, args: &[Value]) -> ReflectResult<()> {
        let parameters = &self.info.parameters;
        if args.len() != parameters.len() {
            return Err(ReflectError::IllegalArgument(format!(
                "{} expects {} arguments, got {}",
                self.signature(),
                parameters.len(),
                args.len()
            )));
        }

        for (index, (arg, parameter)) in args.iter().zip(parameters).enumerate() {
            let Some(actual) = arg.type_handle() else {
                return Err(ReflectError::IllegalArgument(format!(
                    "argument {} is void",
                    index
                )));
            };
            if !actual.same_type(parameter) {
                return Err(ReflectError::IllegalArgument(format!(
                    "argument {}: expected {}, got {}",
                    index, parameter, actual
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.info.visibility)?;
        if self.info.is_static {
            f.write_str("static ")?;
        }
        write!(f, "{}::{}", self.info.declaring_type, self.signature())?;
        if let Some(return_type) = self.info.return_type {
            write!(f, " -> {}", return_type)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MethodDecl;
    use crate::registry::TypeRegistry;
    use crate::values;

    #[derive(Default)]
    struct Counter {
        count: i64,
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register_with::<Counter, _>(|ty| {
            ty.method(
                MethodDecl::new("bump").public().param(TypeHandle::primitive::<i64>()),
                |this: &mut Counter, args: &mut Arguments| {
                    this.count += args.take::<i64>(0)?;
                    Ok(Value::void())
                },
            )
            .method(
                MethodDecl::new("reset").returns(TypeHandle::of::<i64>()),
                |this: &mut Counter, _args: &mut Arguments| {
                    Ok(Value::new(std::mem::take(&mut this.count)))
                },
            )
            .method(
                MethodDecl::new("fail").public(),
                |_this: &mut Counter, _args: &mut Arguments| Err("counter failure".into()),
            )
            .method(
                MethodDecl::new("explode").public(),
                |_this: &mut Counter, _args: &mut Arguments| panic!("counter exploded"),
            )
            .static_method(
                MethodDecl::new("zero").public().returns(TypeHandle::of::<i64>()),
                |_args: &mut Arguments| Ok(Value::new(0i64)),
            )
        });
        registry
    }

    fn lookup(name: &str, params: &[TypeHandle]) -> Method {
        registry()
            .declared_method(TypeHandle::of::<Counter>(), name, params)
            .unwrap()
    }

    #[test]
    fn test_boxed_argument_fills_primitive_parameter() {
        let bump = lookup("bump", &[TypeHandle::primitive::<i64>()]);
        let mut counter = Counter::default();

        let result = bump.invoke(&mut counter, values![5i64]).unwrap();
        assert!(result.is_void());
        assert_eq!(counter.count, 5);
    }

    #[test]
    fn test_private_method_needs_accessible_descriptor() {
        let mut reset = lookup("reset", &[]);
        let mut counter = Counter { count: 3 };

        let err = reset.invoke(&mut counter, values![]).unwrap_err();
        assert!(err.is_access_denied());

        reset.set_accessible();
        let result = reset.invoke(&mut counter, values![]).unwrap();
        assert_eq!(result.cast::<i64>().unwrap(), 3);
        assert_eq!(counter.count, 0);
    }

    #[test]
    fn test_argument_validation() {
        let bump = lookup("bump", &[TypeHandle::primitive::<i64>()]);
        let mut counter = Counter::default();

        let err = bump.invoke(&mut counter, values![]).unwrap_err();
        assert!(matches!(err, ReflectError::IllegalArgument(_)));

        let err = bump.invoke(&mut counter, values![5i32]).unwrap_err();
        assert!(matches!(err, ReflectError::IllegalArgument(_)));

        let err = bump.invoke(&mut counter, vec![Value::void()]).unwrap_err();
        assert!(matches!(err, ReflectError::IllegalArgument(_)));

        let mut wrong = String::new();
        let err = bump.invoke(&mut wrong, values![5i64]).unwrap_err();
        assert!(matches!(err, ReflectError::IllegalArgument(_)));
        assert_eq!(counter.count, 0);
    }

    #[test]
    fn test_body_error_is_wrapped() {
        use std::error::Error;

        let fail = lookup("fail", &[]);
        let err = fail.invoke(&mut Counter::default(), values![]).unwrap_err();
        assert!(matches!(err, ReflectError::InvocationFailed { .. }));
        assert_eq!(err.source().unwrap().to_string(), "counter failure");
    }

    #[test]
    fn test_panic_is_wrapped() {
        use std::error::Error;

        let explode = lookup("explode", &[]);
        let err = explode.invoke(&mut Counter::default(), values![]).unwrap_err();
        let source = err.source().unwrap().downcast_ref::<Panicked>().unwrap();
        assert_eq!(source.0, "counter exploded");
    }

    #[test]
    fn test_static_method() {
        let zero = lookup("zero", &[]);
        assert!(zero.is_static());
        assert_eq!(zero.invoke_static(values![]).unwrap().cast::<i64>().unwrap(), 0);

        let bump = lookup("bump", &[TypeHandle::primitive::<i64>()]);
        let err = bump.invoke_static(values![1i64]).unwrap_err();
        assert!(matches!(err, ReflectError::IllegalArgument(_)));
    }

    #[test]
    fn test_display() {
        let bump = lookup("bump", &[TypeHandle::primitive::<i64>()]);
        let rendered = bump.to_string();
        assert!(rendered.starts_with("public "));
        assert!(rendered.ends_with("Counter::bump(i64)"));

        let zero = lookup("zero", &[]);
        assert!(zero.to_string().contains("static "));
        assert!(zero.to_string().ends_with("zero() -> Box<i64>"));
    }
}
