//! Provisioning commands.
//!
//! Hosts embed [`ProvisionCommand`] into their own command runner (with the
//! `cli` feature it is a `clap` subcommand) and execute it against an engine.

use crate::engine::Engine;
use crate::error::Result;
use crate::store::{MutationStore, Store};
use crate::types::{Guard, PermissionName, RoleName};

/// Creates roles and permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::Subcommand))]
pub enum ProvisionCommand {
    /// Create a role
    CreateRole {
        /// The name of the role
        name: String,
        /// The name of the guard
        guard: Option<String>,
    },
    /// Create a permission
    CreatePermission {
        /// The name of the permission
        name: String,
        /// The name of the guard
        guard: Option<String>,
    },
}

/// Standalone parser for hosts without their own command tree.
#[cfg(feature = "cli")]
#[derive(Debug, clap::Parser)]
#[command(name = "permission", about = "Provision roles and permissions")]
pub struct ProvisionCli {
    /// Command to run.
    #[command(subcommand)]
    pub command: ProvisionCommand,
}

impl ProvisionCommand {
    /// Runs the command and returns the line to print to the operator.
    ///
    /// Invalid names fail with [`Error::InvalidId`](crate::Error::InvalidId);
    /// an existing `(name, guard)` pair fails with the store's error.
    pub async fn execute<S>(self, engine: &Engine<S>) -> Result<String>
    where
        S: Store + MutationStore,
    {
        let registry = engine.registry();
        match self {
            Self::CreateRole { name, guard } => {
                let role = registry
                    .create_role(RoleName::new(name)?, parse_guard(guard)?)
                    .await?;
                Ok(format!("Role `{}` created", role.name))
            }
            Self::CreatePermission { name, guard } => {
                let permission = registry
                    .create_permission(PermissionName::new(name)?, parse_guard(guard)?)
                    .await?;
                Ok(format!("Permission `{}` created", permission.name))
            }
        }
    }
}

fn parse_guard(guard: Option<String>) -> Result<Option<Guard>> {
    guard.map(Guard::new).transpose()
}
