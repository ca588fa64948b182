use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

const MAX_NAME_LEN: usize = 128;

/// Guard used when callers do not name one.
pub const DEFAULT_GUARD: &str = "web";

fn validate(value: &str, kind: &str, allowed: fn(char) -> bool) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if !trimmed.chars().all(allowed) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn is_allowed_id_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, ':' | '_' | '-')
}

// Role and permission names are human facing ("edit articles", "posts.publish").
// `|` stays reserved for requirement alternation.
fn is_allowed_entity_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, ':' | '_' | '-' | '.' | ' ' | '/' | '*')
}

macro_rules! define_name_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr, $allowed:path) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated value.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                validate(value.as_ref(), $kind, $allowed).map(Self)
            }

            /// Creates a value from a trusted string without validation.
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_string(value)
            }
        }
    };
}

define_name_type!(
    /// Authentication context scoping roles and permissions, e.g. `web` or `api`.
    Guard,
    "guard",
    is_allowed_id_char
);
define_name_type!(
    /// Stable identifier of an authenticated subject.
    PrincipalId,
    "principal id",
    is_allowed_id_char
);
define_name_type!(
    /// Store-assigned role identifier.
    RoleId,
    "role id",
    is_allowed_id_char
);
define_name_type!(
    /// Store-assigned permission identifier.
    PermissionId,
    "permission id",
    is_allowed_id_char
);
define_name_type!(
    /// Role name, unique together with its guard.
    RoleName,
    "role name",
    is_allowed_entity_name_char
);
define_name_type!(
    /// Permission name, unique together with its guard.
    PermissionName,
    "permission name",
    is_allowed_entity_name_char
);

impl Default for Guard {
    fn default() -> Self {
        Self(DEFAULT_GUARD.to_string())
    }
}

impl PrincipalId {
    /// Creates a principal id from `kind` and `account_id` segments,
    /// e.g. `("user", "42")` becomes `user:42`.
    pub fn try_from_parts(kind: impl AsRef<str>, account_id: impl AsRef<str>) -> Result<Self> {
        let kind = validate(kind.as_ref(), "principal kind", is_allowed_id_char)?;
        let account_id = validate(
            account_id.as_ref(),
            "principal account id",
            is_allowed_id_char,
        )?;
        Self::new(format!("{kind}:{account_id}"))
    }
}

/// Kind of named entity, used in lookups and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EntityKind {
    /// A role.
    Role,
    /// A permission.
    Permission,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role => f.write_str("role"),
            Self::Permission => f.write_str("permission"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_id_try_from_parts_success() {
        let principal = PrincipalId::try_from_parts("user", "user_1").expect("principal id");
        assert_eq!(principal.as_str(), "user:user_1");
    }

    #[test]
    fn principal_id_try_from_parts_rejects_empty_segment() {
        let err = PrincipalId::try_from_parts("user", "   ").expect_err("must reject");
        assert!(err.to_string().contains("principal account id"));
    }

    #[test]
    fn entity_names_allow_spaces_and_dots() {
        let name = PermissionName::try_from(" edit articles ").unwrap();
        assert_eq!(name.as_str(), "edit articles");
        assert!(RoleName::try_from("posts.editor").is_ok());
    }

    #[test]
    fn entity_names_reject_alternation_delimiter() {
        let err = PermissionName::try_from("edit|publish").expect_err("must reject");
        assert!(matches!(err, Error::InvalidId(_)));
    }

    #[test]
    fn guard_rejects_spaces_and_defaults_to_web() {
        assert!(Guard::try_from("web api").is_err());
        assert_eq!(Guard::default().as_str(), DEFAULT_GUARD);
    }
}
