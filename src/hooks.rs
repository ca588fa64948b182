//! Post-mutation hooks.
//!
//! Every role or permission write that goes through [`Registry`](crate::Registry)
//! produces a [`MutationEvent`]. The registry hands it to the
//! [`Invalidator`] first, then to any registered [`MutationListener`]s.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::cache::PermissionCache;
use crate::types::{EntityKind, Guard};

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationOp {
    /// Entity inserted.
    Created,
    /// Entity renamed or its links changed.
    Updated,
    /// Entity removed.
    Deleted,
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Updated => f.write_str("updated"),
            Self::Deleted => f.write_str("deleted"),
        }
    }
}

/// A committed role or permission write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    /// Entity kind.
    pub kind: EntityKind,
    /// Operation.
    pub op: MutationOp,
    /// Entity name at the time of the write.
    pub name: String,
    /// Entity guard.
    pub guard: Guard,
}

impl MutationEvent {
    pub(crate) fn new(
        kind: EntityKind,
        op: MutationOp,
        name: impl Into<String>,
        guard: &Guard,
    ) -> Self {
        Self {
            kind,
            op,
            name: name.into(),
            guard: guard.clone(),
        }
    }
}

/// Observer notified after each committed write.
pub trait MutationListener: Send + Sync {
    /// Called once per committed write, after the snapshot was invalidated.
    fn on_mutation(&self, event: &MutationEvent);
}

impl<F> MutationListener for F
where
    F: Fn(&MutationEvent) + Send + Sync,
{
    fn on_mutation(&self, event: &MutationEvent) {
        self(event)
    }
}

/// Cloneable handle that marks the shared snapshot stale.
///
/// Hosts that mutate roles or permissions outside the registry (e.g. from
/// their own ORM lifecycle callbacks) call [`notify`](Self::notify) or
/// [`invalidate`](Self::invalidate) after the write commits.
#[derive(Debug, Clone)]
pub struct Invalidator {
    cache: Arc<PermissionCache>,
}

impl Invalidator {
    pub(crate) fn new(cache: Arc<PermissionCache>) -> Self {
        Self { cache }
    }

    /// Marks the snapshot stale.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Marks the snapshot stale on behalf of `event`.
    pub fn notify(&self, event: &MutationEvent) {
        debug!(
            kind = %event.kind,
            op = %event.op,
            name = %event.name,
            guard = %event.guard,
            "entity mutation committed"
        );
        self.cache.invalidate();
    }
}
