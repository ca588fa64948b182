//! Framework-agnostic request gate.
//!
//! A [`Gate`] pairs an [`Engine`] with a declarative [`Requirement`]. Each
//! request starts at [`GateState::Unchecked`] and ends either
//! [`Authorized`](GateState::Authorized) or [`Denied`](GateState::Denied).
//! The gate keeps no state between requests.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::requirement::{Requirement, RequirementKind};
use crate::store::Store;
use crate::types::{Guard, PrincipalId};

/// Status code attached to every denial.
pub const DENIAL_STATUS: u16 = 403;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DenialKind {
    /// No principal on the request.
    NotAuthenticated,
    /// Principal present but lacking the requirement.
    Forbidden(RequirementKind),
}

/// Typed rejection for the host to render.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Denial {
    /// Reason.
    pub kind: DenialKind,
    /// HTTP-style status code.
    pub status: u16,
    /// Human-readable message.
    pub message: String,
    /// Names that were required; empty for unauthenticated requests.
    pub required: Vec<String>,
}

impl Denial {
    /// Whether no principal was present.
    pub fn is_not_authenticated(&self) -> bool {
        self.kind == DenialKind::NotAuthenticated
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Per-request gate state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GateState {
    /// Not evaluated yet.
    #[default]
    Unchecked,
    /// Requirement satisfied; the request may continue.
    Authorized,
    /// Request rejected.
    Denied(Denial),
}

impl GateState {
    /// Whether the request may continue.
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }
}

/// Requirement check placed in front of a request handler.
pub struct Gate<S> {
    engine: Arc<Engine<S>>,
    requirement: Requirement,
    guard: Guard,
}

impl<S> fmt::Debug for Gate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("requirement", &self.requirement)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl<S> Clone for Gate<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            requirement: self.requirement.clone(),
            guard: self.guard.clone(),
        }
    }
}

impl<S> Gate<S> {
    /// Creates a gate checked against the engine's default guard.
    pub fn new(engine: Arc<Engine<S>>, requirement: Requirement) -> Self {
        let guard = engine.default_guard().clone();
        Self {
            engine,
            requirement,
            guard,
        }
    }

    /// Gate requiring any permission of `"a|b|c"`.
    pub fn permission(engine: Arc<Engine<S>>, input: &str) -> Result<Self> {
        Ok(Self::new(engine, Requirement::permissions(input)?))
    }

    /// Gate requiring any role of `"a|b|c"`.
    pub fn role(engine: Arc<Engine<S>>, input: &str) -> Result<Self> {
        Ok(Self::new(engine, Requirement::roles(input)?))
    }

    /// Checks against `guard` instead of the default guard.
    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = guard;
        self
    }

    /// The requirement enforced by this gate.
    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    fn not_authenticated(&self) -> Denial {
        Denial {
            kind: DenialKind::NotAuthenticated,
            status: DENIAL_STATUS,
            message: self.engine.messages().not_logged_in.clone(),
            required: Vec::new(),
        }
    }

    fn forbidden(&self) -> Denial {
        let required = self.requirement.names();
        let messages = self.engine.messages();
        let message = match self.requirement.kind() {
            RequirementKind::Permission => messages.unauthorized_permission(&required),
            RequirementKind::Role => messages.unauthorized_role(&required),
        };
        Denial {
            kind: DenialKind::Forbidden(self.requirement.kind()),
            status: DENIAL_STATUS,
            message,
            required,
        }
    }
}

impl<S> Gate<S>
where
    S: Store,
{
    /// Moves a fresh request out of [`GateState::Unchecked`].
    ///
    /// Store failures are returned as errors, never as `Authorized`.
    pub async fn evaluate(&self, principal: Option<&PrincipalId>) -> Result<GateState> {
        Ok(match self.decide(principal).await? {
            Ok(()) => GateState::Authorized,
            Err(denial) => GateState::Denied(denial),
        })
    }

    /// Like [`evaluate`](Self::evaluate), turning a denial into [`Error::Denied`].
    pub async fn check(&self, principal: Option<&PrincipalId>) -> Result<()> {
        self.decide(principal).await?.map_err(Error::Denied)
    }

    /// Runs `next` only if the request is authorized.
    pub async fn handle<F, Fut, T>(&self, principal: Option<&PrincipalId>, next: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.check(principal).await?;
        Ok(next().await)
    }

    async fn decide(
        &self,
        principal: Option<&PrincipalId>,
    ) -> Result<std::result::Result<(), Denial>> {
        let Some(principal) = principal else {
            debug!(requirement = %self.requirement, "gate denied: not authenticated");
            return Ok(Err(self.not_authenticated()));
        };

        let allowed = self
            .engine
            .satisfies(principal, &self.requirement, &self.guard)
            .await?;
        if !allowed {
            debug!(
                principal = %principal,
                requirement = %self.requirement,
                "gate denied: forbidden"
            );
            return Ok(Err(self.forbidden()));
        }
        Ok(Ok(()))
    }
}

#[cfg(all(test, feature = "memory-store"))]
mod tests {
    use super::*;
    use crate::engine::EngineBuilder;
    use crate::error::StoreError;
    use crate::memory_store::MemoryStore;
    use crate::model::{Permission, Role};
    use crate::store::{PermissionStore, PrincipalStore, RoleStore};
    use crate::types::{PermissionName, RoleName};
    use async_trait::async_trait;
    use futures::executor::block_on;

    /// Serves an empty role graph but cannot read principal assignments.
    struct AssignmentsOffline;

    #[async_trait]
    impl RoleStore for AssignmentsOffline {
        async fn all_roles(&self) -> std::result::Result<Vec<Role>, StoreError> {
            Ok(Vec::new())
        }

        async fn find_role_by_name(
            &self,
            _name: &RoleName,
            _guard: &Guard,
        ) -> std::result::Result<Option<Role>, StoreError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl PermissionStore for AssignmentsOffline {
        async fn all_permissions(&self) -> std::result::Result<Vec<Permission>, StoreError> {
            Ok(Vec::new())
        }

        async fn find_permission_by_name(
            &self,
            _name: &PermissionName,
            _guard: &Guard,
        ) -> std::result::Result<Option<Permission>, StoreError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl PrincipalStore for AssignmentsOffline {
        async fn principal_roles(
            &self,
            _principal: &PrincipalId,
        ) -> std::result::Result<Vec<Role>, StoreError> {
            Err("connection refused".into())
        }

        async fn principal_permissions(
            &self,
            _principal: &PrincipalId,
        ) -> std::result::Result<Vec<Permission>, StoreError> {
            Err("connection refused".into())
        }
    }

    fn engine_with_publisher() -> (Arc<Engine<MemoryStore>>, PrincipalId) {
        let engine = Arc::new(EngineBuilder::new(MemoryStore::new()).build());
        let principal = PrincipalId::try_from("user_1").unwrap();
        block_on(async {
            let registry = engine.registry();
            let publish = registry
                .create_permission(PermissionName::try_from("publish").unwrap(), None)
                .await
                .unwrap();
            registry
                .create_permission(PermissionName::try_from("edit").unwrap(), None)
                .await
                .unwrap();
            let writer = registry
                .create_role(RoleName::try_from("writer").unwrap(), None)
                .await
                .unwrap();
            registry
                .give_permission_to_role(&writer, &publish)
                .await
                .unwrap();
            registry.assign_role(&principal, &writer).await.unwrap();
        });
        (engine, principal)
    }

    #[test]
    fn alternation_authorizes_when_any_name_is_held() {
        let (engine, principal) = engine_with_publisher();
        let gate = Gate::permission(engine, "edit|publish").unwrap();

        let state = block_on(gate.evaluate(Some(&principal))).unwrap();
        assert_eq!(state, GateState::Authorized);
    }

    #[test]
    fn missing_principal_is_not_authenticated() {
        let (engine, _) = engine_with_publisher();
        let gate = Gate::role(engine, "writer").unwrap();

        let err = block_on(gate.check(None)).unwrap_err();
        let denial = err.denial().expect("denial");
        assert!(denial.is_not_authenticated());
        assert_eq!(denial.status, DENIAL_STATUS);
        assert_eq!(denial.message, "User is not logged in.");
    }

    #[test]
    fn forbidden_carries_required_names() {
        let (engine, principal) = engine_with_publisher();
        let gate = Gate::role(engine, "admin|owner").unwrap();

        let GateState::Denied(denial) = block_on(gate.evaluate(Some(&principal))).unwrap() else {
            panic!("expected denial");
        };
        assert_eq!(denial.kind, DenialKind::Forbidden(RequirementKind::Role));
        assert_eq!(denial.required, vec!["admin".to_string(), "owner".to_string()]);
        assert!(denial.message.ends_with("admin, owner"));
    }

    #[test]
    fn handle_runs_next_only_when_authorized() {
        let (engine, principal) = engine_with_publisher();
        let allowed = Gate::permission(Arc::clone(&engine), "publish").unwrap();
        let blocked = Gate::permission(engine, "edit").unwrap();

        let out = block_on(allowed.handle(Some(&principal), || async { 7 })).unwrap();
        assert_eq!(out, 7);

        let mut ran = false;
        let result = block_on(blocked.handle(Some(&principal), || {
            ran = true;
            async {}
        }));
        assert!(matches!(result, Err(Error::Denied(_))));
        assert!(!ran);
    }

    #[test]
    fn other_guard_does_not_satisfy() {
        let (engine, principal) = engine_with_publisher();
        let gate = Gate::permission(engine, "publish")
            .unwrap()
            .with_guard(Guard::try_from("api").unwrap());

        assert!(!block_on(gate.evaluate(Some(&principal))).unwrap().is_authorized());
    }

    #[test]
    fn store_failure_is_an_error_not_a_decision() {
        let engine = Arc::new(EngineBuilder::new(AssignmentsOffline).build());
        let principal = PrincipalId::try_from("user_1").unwrap();
        let gate = Gate::permission(engine, "edit|publish").unwrap();

        assert!(matches!(
            block_on(gate.evaluate(Some(&principal))),
            Err(Error::Store(_))
        ));
        assert!(matches!(
            block_on(gate.check(Some(&principal))),
            Err(Error::Store(_))
        ));

        let mut ran = false;
        let result = block_on(gate.handle(Some(&principal), || {
            ran = true;
            async {}
        }));
        assert!(matches!(result, Err(Error::Store(_))));
        assert!(!ran);
    }
}
