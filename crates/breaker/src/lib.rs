//! Breaker - runtime lookup and invocation of declared methods
//!
//! For the odd times when a method has to be reached around its visibility,
//! usually while working around a third-party type. Types opt in by
//! registering their declared methods; a [`Breaker`] then finds them by
//! name and exact parameter types and invokes them, private or not.
//!
//! # Example
//!
//! ```ignore
//! use breaker::{reflect, values, Breaker, TypeHandle, TypeRegistry};
//!
//! struct Account {
//!     balance: i64,
//! }
//!
//! #[reflect]
//! impl Account {
//!     fn audit(&self) -> String {
//!         format!("balance={}", self.balance)
//!     }
//!
//!     fn adjust(&mut self, delta: i64) {
//!         self.balance += delta;
//!     }
//! }
//!
//! let mut registry = TypeRegistry::new();
//! registry.register::<Account>();
//! let breaker = Breaker::new(registry);
//!
//! let mut account = Account { balance: 10 };
//! let audit: String = breaker.invoke(&mut account, "audit", values![])?;
//!
//! // `i64` parameters are primitive and cannot be found from boxed
//! // arguments; resolve them explicitly instead.
//! let adjust = breaker.declared_method(
//!     TypeHandle::of::<Account>(),
//!     "adjust",
//!     &[TypeHandle::primitive::<i64>()],
//! )?;
//! adjust.invoke(&mut account, values![5i64])?;
//! ```
//!
//! ## Modules
//!
//! - `types`: type handles and the identity-only [`Object`]
//! - `value`: boxed [`Value`]s and method [`Arguments`]
//! - `metadata`: per-type declared-method tables
//! - `builder`: declaring methods by hand, the [`Reflected`] trait
//! - `registry`: the shared [`TypeRegistry`]
//! - `method`: resolved [`Method`] descriptors
//! - `permissions`: the [`AccessPolicy`] and its TOML configuration
//! - `accessor`: the [`Breaker`] itself

#![warn(missing_docs)]

// Lets `#[reflect]` expansions name `::breaker` inside this crate's own tests
extern crate self as breaker;

mod accessor;
mod builder;
mod error;
mod metadata;
mod method;
mod permissions;
mod registry;
mod types;
mod value;

pub use accessor::Breaker;
pub use builder::{MethodDecl, Reflected, TypeBuilder};
pub use error::{ArgumentError, BoxError, Panicked, ReflectError, ReflectResult};
pub use metadata::{TypeInfo, Visibility};
pub use method::Method;
pub use permissions::{AccessPolicy, ConfigError, ReflectionPermission, TypePermissionRule};
pub use registry::TypeRegistry;
pub use types::{Object, Primitive, TypeForm, TypeHandle};
pub use value::{Arguments, Value};

pub use breaker_macros::reflect;
