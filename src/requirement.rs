use std::fmt;

use crate::error::{Error, Result};
use crate::types::{PermissionName, RoleName};

const ALTERNATION: char = '|';

/// What a guarded route needs: any one of the listed permissions or roles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// Satisfied if the principal holds at least one of the permissions.
    AnyPermission(Vec<PermissionName>),
    /// Satisfied if the principal holds at least one of the roles.
    AnyRole(Vec<RoleName>),
}

/// Requirement category, reported in denials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RequirementKind {
    /// Permission requirement.
    Permission,
    /// Role requirement.
    Role,
}

impl Requirement {
    /// Parses `"edit-articles|publish-articles"` into a permission requirement.
    pub fn permissions(input: &str) -> Result<Self> {
        split_alternation(input)?
            .into_iter()
            .map(PermissionName::new)
            .collect::<Result<Vec<_>>>()
            .map(Self::AnyPermission)
    }

    /// Parses `"admin|editor"` into a role requirement.
    pub fn roles(input: &str) -> Result<Self> {
        split_alternation(input)?
            .into_iter()
            .map(RoleName::new)
            .collect::<Result<Vec<_>>>()
            .map(Self::AnyRole)
    }

    /// Requirement category.
    pub fn kind(&self) -> RequirementKind {
        match self {
            Self::AnyPermission(_) => RequirementKind::Permission,
            Self::AnyRole(_) => RequirementKind::Role,
        }
    }

    /// Required names in declaration order.
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::AnyPermission(names) => names.iter().map(|n| n.as_str().to_string()).collect(),
            Self::AnyRole(names) => names.iter().map(|n| n.as_str().to_string()).collect(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join("|"))
    }
}

fn split_alternation(input: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = input.split(ALTERNATION).map(str::trim).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(Error::InvalidRequirement(format!(
            "`{input}` contains an empty alternative"
        )));
    }
    Ok(parts)
}
