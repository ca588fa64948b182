//! Guard-scoped RBAC authorization library.
//!
//! This crate provides strong-typed role and permission names, a pluggable
//! async store interface, and a process-wide permission snapshot that is
//! rebuilt lazily after any role or permission write. The default behavior is
//! deny-by-default: unknown names, foreign guards, and empty requirement sets
//! never authorize.
//!
//! Use [`Engine`] for checks, [`Registry`] for writes, and [`Gate`] to protect
//! request handlers with `"a|b"` requirement strings.
//!
//! # Examples
//!
//! Basic authorization flow using the in-memory store (enable `memory-store`):
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # futures::executor::block_on(async {
//! use rs_guard::{EngineBuilder, Guard, MemoryStore, PermissionName, PrincipalId, RoleName};
//!
//! let engine = EngineBuilder::new(MemoryStore::new()).build();
//! let registry = engine.registry();
//! let publish = registry
//!     .create_permission(PermissionName::try_from("publish articles").unwrap(), None)
//!     .await
//!     .unwrap();
//! let writer = registry
//!     .create_role(RoleName::try_from("writer").unwrap(), None)
//!     .await
//!     .unwrap();
//! registry.give_permission_to_role(&writer, &publish).await.unwrap();
//!
//! let principal = PrincipalId::try_from("user_1").unwrap();
//! registry.assign_role(&principal, &writer).await.unwrap();
//!
//! let allowed = engine
//!     .has_permission(&principal, &publish.name, &Guard::default())
//!     .await
//!     .unwrap();
//! assert!(allowed);
//! # });
//! ```
//!
//! Guarding a handler:
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # futures::executor::block_on(async {
//! use std::sync::Arc;
//! use rs_guard::{EngineBuilder, Gate, MemoryStore, PrincipalId};
//!
//! let engine = Arc::new(EngineBuilder::new(MemoryStore::new()).build());
//! let gate = Gate::permission(engine, "edit articles|publish articles").unwrap();
//! let principal = PrincipalId::try_from("user_1").unwrap();
//! let denied = gate.check(Some(&principal)).await.unwrap_err();
//! assert!(denied.denial().is_some());
//! # });
//! ```
#![forbid(unsafe_code)]

mod cache;
mod commands;
mod config;
mod engine;
mod error;
mod gate;
mod hooks;
mod model;
mod registry;
mod requirement;
mod snapshot;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::cache::PermissionCache;
pub use crate::commands::ProvisionCommand;
pub use crate::config::{GuardConfig, Messages};
pub use crate::engine::{Decision, Engine, EngineBuilder, Grants};
pub use crate::error::{Error, Result, StoreError};
pub use crate::gate::{DENIAL_STATUS, Denial, DenialKind, Gate, GateState};
pub use crate::hooks::{Invalidator, MutationEvent, MutationListener, MutationOp};
pub use crate::model::{Permission, PermissionRef, Role, RoleRef};
pub use crate::registry::Registry;
pub use crate::requirement::{Requirement, RequirementKind};
pub use crate::snapshot::PermissionSnapshot;
pub use crate::store::{MutationStore, PermissionStore, PrincipalStore, RoleStore, Store};
pub use crate::types::{
    DEFAULT_GUARD, EntityKind, Guard, PermissionId, PermissionName, PrincipalId, RoleId, RoleName,
};

#[cfg(feature = "cli")]
pub use crate::commands::ProvisionCli;

#[cfg(feature = "memory-store")]
pub use crate::memory_store::{MemoryStore, MemoryStoreError};
