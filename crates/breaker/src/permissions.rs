//! Reflection access policy
//!
//! Decides whether a method's declared visibility may be overridden. Each
//! visibility level has its own permission flag; a type's permissions are
//! resolved from the most specific source available:
//!
//! 1. a per-type override set in code ([`AccessPolicy::set_type`])
//! 2. an exact type-path entry
//! 3. the most specific matching type-path pattern
//! 4. the global default
//!
//! ## TOML Configuration
//!
//! ```toml
//! [reflect.permissions]
//! global = "INVOKE_PUBLIC"
//!
//! [reflect.permissions.types]
//! "my_app::model::*" = "ALL"
//! "my_app::vendor::**" = "NONE"
//! "my_app::Session" = "INVOKE_PUBLIC | INVOKE_PRIVATE"
//! ```
//!
//! Pattern forms: `prefix::*` matches direct children of `prefix`,
//! `prefix::**` matches at any depth, `*` and `**` match everything.

use std::any::TypeId;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

use crate::metadata::Visibility;
use crate::types::TypeHandle;

bitflags! {
    /// Reflection permission flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReflectionPermission: u8 {
        /// Invoke public methods
        const INVOKE_PUBLIC = 0x01;
        /// Invoke package-visible methods
        const INVOKE_PACKAGE = 0x02;
        /// Invoke protected methods
        const INVOKE_PROTECTED = 0x04;
        /// Invoke private methods
        const INVOKE_PRIVATE = 0x08;

        /// INVOKE_PACKAGE | INVOKE_PROTECTED | INVOKE_PRIVATE
        const NON_PUBLIC = Self::INVOKE_PACKAGE.bits()
            | Self::INVOKE_PROTECTED.bits()
            | Self::INVOKE_PRIVATE.bits();
        /// Every visibility level
        const ALL = Self::INVOKE_PUBLIC.bits() | Self::NON_PUBLIC.bits();
    }
}

impl ReflectionPermission {
    /// No reflective invocation allowed
    pub const NONE: Self = Self::empty();

    /// Parse `NONE`, flag names joined by `|`, or a `0x` hex value
    ///
    /// Flag names are matched in any case. Blank input and empty `|`
    /// segments are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        s.split('|').try_fold(Self::NONE, |acc, flag| {
            let flag = flag.trim();
            let parsed = if let Some(hex) = flag.strip_prefix("0x") {
                Self::from_bits(u8::from_str_radix(hex, 16).ok()?)?
            } else if flag.eq_ignore_ascii_case("NONE") {
                Self::NONE
            } else {
                Self::from_name(&flag.to_ascii_uppercase())?
            };
            Some(acc | parsed)
        })
    }
}

impl Default for ReflectionPermission {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for ReflectionPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        bitflags::parser::to_writer(self, f)
    }
}

/// Errors that can occur loading a policy
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read policy file
    #[error("Failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse policy: {0}")]
    Parse(#[from] toml::de::Error),

    /// Permission string not understood
    #[error("Invalid permission {value:?} for {key}")]
    InvalidPermission {
        /// Config key the value belongs to
        key: String,
        /// Offending value
        value: String,
    },
}

/// Type-path pattern rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePermissionRule {
    /// Pattern (e.g., "my_app::model::*", "my_app::**", "*")
    pub pattern: String,
    /// Permissions for matching types
    pub permissions: ReflectionPermission,
}

impl TypePermissionRule {
    /// Check if a pattern string uses wildcards
    pub fn is_pattern(pattern: &str) -> bool {
        pattern == "*" || pattern == "**" || pattern.ends_with("::*") || pattern.ends_with("::**")
    }

    /// Check if a type path matches this rule
    pub fn matches(&self, type_path: &str) -> bool {
        if self.pattern == "**" || self.pattern == "*" {
            return true;
        }

        if let Some(prefix) = self.pattern.strip_suffix("::**") {
            type_path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with("::"))
        } else if let Some(prefix) = self.pattern.strip_suffix("::*") {
            type_path
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix("::"))
                .is_some_and(|name| !name.is_empty() && !name.contains("::"))
        } else {
            self.pattern == type_path
        }
    }

    /// Longer prefixes are more specific; `::*` beats `::**` on the same prefix
    fn specificity(&self) -> (usize, bool) {
        match self.pattern.strip_suffix("::**") {
            Some(prefix) => (prefix.len(), false),
            None => match self.pattern.strip_suffix("::*") {
                Some(prefix) => (prefix.len(), true),
                None => (0, self.pattern == "*"),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    reflect: ReflectSection,
}

#[derive(Debug, Default, Deserialize)]
struct ReflectSection {
    #[serde(default)]
    permissions: PermissionsSection,
}

#[derive(Debug, Default, Deserialize)]
struct PermissionsSection {
    global: Option<String>,
    #[serde(default)]
    types: BTreeMap<String, String>,
}

/// Policy deciding which visibilities may be overridden on which types
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    /// Global default permissions
    global_default: ReflectionPermission,
    /// Per-type overrides set in code
    type_permissions: FxHashMap<TypeId, ReflectionPermission>,
    /// Exact type-path entries
    path_permissions: FxHashMap<String, ReflectionPermission>,
    /// Pattern rules, most specific first
    rules: Vec<TypePermissionRule>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

impl AccessPolicy {
    /// Policy allowing every override
    pub fn permissive() -> Self {
        Self::with_global(ReflectionPermission::ALL)
    }

    /// Policy with the given global default and no other entries
    pub fn with_global(global: ReflectionPermission) -> Self {
        Self {
            global_default: global,
            type_permissions: FxHashMap::default(),
            path_permissions: FxHashMap::default(),
            rules: Vec::new(),
        }
    }

    /// Check if anything other than an all-permitting default is configured
    pub fn has_any_restrictions(&self) -> bool {
        self.global_default != ReflectionPermission::ALL
            || !self.type_permissions.is_empty()
            || !self.path_permissions.is_empty()
            || !self.rules.is_empty()
    }

    // ===== Global Permissions =====

    /// Set global default permissions
    pub fn set_global(&mut self, permissions: ReflectionPermission) -> &mut Self {
        self.global_default = permissions;
        self
    }

    /// Get global default permissions
    pub fn global(&self) -> ReflectionPermission {
        self.global_default
    }

    // ===== Type Permissions =====

    /// Override permissions for `T`
    pub fn set_type<T: ?Sized + 'static>(&mut self, permissions: ReflectionPermission) -> &mut Self {
        self.type_permissions.insert(TypeId::of::<T>(), permissions);
        self
    }

    /// Remove the override for `T`
    pub fn clear_type<T: ?Sized + 'static>(&mut self) -> &mut Self {
        self.type_permissions.remove(&TypeId::of::<T>());
        self
    }

    /// Set permissions for a type path or pattern
    pub fn set_path(&mut self, pattern: &str, permissions: ReflectionPermission) -> &mut Self {
        if TypePermissionRule::is_pattern(pattern) {
            self.rules.retain(|rule| rule.pattern != pattern);
            self.rules.push(TypePermissionRule {
                pattern: pattern.to_string(),
                permissions,
            });
            self.rules.sort_by_key(|rule| Reverse(rule.specificity()));
        } else {
            self.path_permissions.insert(pattern.to_string(), permissions);
        }
        self
    }

    /// Pattern rules, most specific first
    pub fn rules(&self) -> &[TypePermissionRule] {
        &self.rules
    }

    // ===== Permission Resolution =====

    /// Resolve permissions for a type
    pub fn permissions_for(&self, ty: TypeHandle) -> ReflectionPermission {
        if let Some(&permissions) = self.type_permissions.get(&ty.type_id()) {
            return permissions;
        }

        let path = ty.path();
        if let Some(&permissions) = self.path_permissions.get(path) {
            return permissions;
        }

        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(|rule| rule.permissions)
            .unwrap_or(self.global_default)
    }

    /// Check if methods of `visibility` on `ty` may be made accessible
    pub fn allows(&self, ty: TypeHandle, visibility: Visibility) -> bool {
        self.permissions_for(ty)
            .contains(visibility.required_permission())
    }

    // ===== TOML Configuration =====

    /// Parse a policy from TOML
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: PolicyFile = toml::from_str(content)?;
        let section = file.reflect.permissions;

        let mut policy = Self::permissive();
        if let Some(global) = section.global {
            policy.set_global(parse_permission("global", &global)?);
        }
        for (pattern, value) in &section.types {
            policy.set_path(pattern, parse_permission(pattern, value)?);
        }

        tracing::debug!(
            global = %policy.global_default,
            paths = policy.path_permissions.len(),
            rules = policy.rules.len(),
            "loaded reflection policy"
        );
        Ok(policy)
    }

    /// Load a policy from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

fn parse_permission(key: &str, value: &str) -> Result<ReflectionPermission, ConfigError> {
    ReflectionPermission::parse(value).ok_or_else(|| ConfigError::InvalidPermission {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Secret;

    #[test]
    fn test_permission_parsing() {
        assert_eq!(ReflectionPermission::parse("NONE"), Some(ReflectionPermission::NONE));
        assert_eq!(ReflectionPermission::parse("ALL"), Some(ReflectionPermission::ALL));
        assert_eq!(
            ReflectionPermission::parse("INVOKE_PUBLIC | INVOKE_PRIVATE"),
            Some(ReflectionPermission::INVOKE_PUBLIC | ReflectionPermission::INVOKE_PRIVATE)
        );
        assert_eq!(
            ReflectionPermission::parse("0x0f"),
            Some(ReflectionPermission::ALL)
        );
        assert_eq!(ReflectionPermission::parse("INVOKE_EVERYTHING"), None);
    }

    #[test]
    fn test_permission_names_ignore_case() {
        assert_eq!(ReflectionPermission::parse("all"), Some(ReflectionPermission::ALL));
        assert_eq!(ReflectionPermission::parse("none"), Some(ReflectionPermission::NONE));
        assert_eq!(
            ReflectionPermission::parse("invoke_public | Invoke_Package"),
            Some(ReflectionPermission::INVOKE_PUBLIC | ReflectionPermission::INVOKE_PACKAGE)
        );
    }

    #[test]
    fn test_blank_permission_rejected() {
        assert_eq!(ReflectionPermission::parse(""), None);
        assert_eq!(ReflectionPermission::parse("   "), None);
        assert_eq!(ReflectionPermission::parse("INVOKE_PUBLIC |"), None);
        assert_eq!(ReflectionPermission::parse("0x"), None);
    }

    #[test]
    fn test_permission_display() {
        assert_eq!(ReflectionPermission::NONE.to_string(), "NONE");
        assert_eq!(ReflectionPermission::INVOKE_PUBLIC.to_string(), "INVOKE_PUBLIC");
    }

    #[test]
    fn test_flag_combinations() {
        assert!(ReflectionPermission::ALL.contains(ReflectionPermission::NON_PUBLIC));
        assert!(!ReflectionPermission::NON_PUBLIC.contains(ReflectionPermission::INVOKE_PUBLIC));
        assert_eq!(ReflectionPermission::default(), ReflectionPermission::ALL);
    }

    #[test]
    fn test_rule_matching() {
        let rule = |pattern: &str| TypePermissionRule {
            pattern: pattern.to_string(),
            permissions: ReflectionPermission::NONE,
        };

        assert!(rule("*").matches("anything::Here"));
        assert!(rule("app::model::*").matches("app::model::User"));
        assert!(!rule("app::model::*").matches("app::model::inner::User"));
        assert!(!rule("app::model::*").matches("app::models::User"));
        assert!(rule("app::**").matches("app::model::inner::User"));
        assert!(!rule("app::**").matches("application::User"));
        assert!(rule("app::User").matches("app::User"));
        assert!(!rule("app::User").matches("app::UserId"));
    }

    #[test]
    fn test_resolution_order() {
        let mut policy = AccessPolicy::with_global(ReflectionPermission::NONE);
        policy
            .set_path("**", ReflectionPermission::INVOKE_PUBLIC)
            .set_path("app::**", ReflectionPermission::NON_PUBLIC)
            .set_path("app::model::*", ReflectionPermission::INVOKE_PRIVATE);

        assert_eq!(policy.rules()[0].pattern, "app::model::*");
        assert_eq!(policy.rules()[2].pattern, "**");

        let patterned = |path: &'static str| {
            policy
                .rules()
                .iter()
                .find(|rule| rule.matches(path))
                .map(|rule| rule.permissions)
        };
        assert_eq!(patterned("app::model::User"), Some(ReflectionPermission::INVOKE_PRIVATE));
        assert_eq!(patterned("app::service::Db"), Some(ReflectionPermission::NON_PUBLIC));
        assert_eq!(patterned("other::Thing"), Some(ReflectionPermission::INVOKE_PUBLIC));
    }

    #[test]
    fn test_type_override_wins() {
        let handle = TypeHandle::of::<Secret>();
        let mut policy = AccessPolicy::permissive();
        policy.set_path(handle.path(), ReflectionPermission::INVOKE_PUBLIC);

        assert!(policy.allows(handle, Visibility::Public));
        assert!(!policy.allows(handle, Visibility::Private));

        policy.set_type::<Secret>(ReflectionPermission::NONE);
        assert!(!policy.allows(handle, Visibility::Public));

        policy.clear_type::<Secret>();
        assert!(policy.allows(handle, Visibility::Public));
    }

    #[test]
    fn test_has_any_restrictions() {
        let mut policy = AccessPolicy::default();
        assert!(!policy.has_any_restrictions());

        policy.set_global(ReflectionPermission::INVOKE_PUBLIC);
        assert!(policy.has_any_restrictions());
    }

    #[test]
    fn test_from_toml() {
        let policy = AccessPolicy::from_toml_str(
            r#"
            [reflect.permissions]
            global = "INVOKE_PUBLIC"

            [reflect.permissions.types]
            "app::model::*" = "ALL"
            "app::Session" = "INVOKE_PUBLIC | INVOKE_PRIVATE"
            "#,
        )
        .unwrap();

        assert_eq!(policy.global(), ReflectionPermission::INVOKE_PUBLIC);
        assert_eq!(policy.rules().len(), 1);
        assert_eq!(
            policy.path_permissions.get("app::Session"),
            Some(&(ReflectionPermission::INVOKE_PUBLIC | ReflectionPermission::INVOKE_PRIVATE))
        );
    }

    #[test]
    fn test_empty_toml_is_permissive() {
        let policy = AccessPolicy::from_toml_str("").unwrap();
        assert!(!policy.has_any_restrictions());
    }

    #[test]
    fn test_invalid_permission() {
        let err = AccessPolicy::from_toml_str(
            r#"
            [reflect.permissions.types]
            "app::*" = "READ_EVERYTHING"
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::InvalidPermission { key, value } => {
                assert_eq!(key, "app::*");
                assert_eq!(value, "READ_EVERYTHING");
            }
            other => panic!("unexpected error: {}", other),
        }

        let err = AccessPolicy::from_toml_str("[reflect.permissions]\nglobal = \"\"\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidPermission { ref key, ref value } if key == "global" && value.is_empty()
        ));

        let err = AccessPolicy::from_toml_str(
            r#"
            [reflect.permissions.types]
            "app::*" = " "
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPermission { .. }));

        let policy = AccessPolicy::from_toml_str("[reflect.permissions]\nglobal = \"all\"\n").unwrap();
        assert_eq!(policy.global(), ReflectionPermission::ALL);
    }

    #[test]
    fn test_malformed_toml() {
        let err = AccessPolicy::from_toml_str("[reflect.permissions\nglobal = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
