//! Merge-or-create reconciliation against the entity store.
//!
//! ## Upsert protocol
//!
//! 1. Merge the entity's attributes into the remote entity at `entity.id`.
//! 2. Merge succeeded → [`ReconcileOutcome::Updated`].
//! 3. Merge said "not found" → create the full entity.
//!    Success → [`ReconcileOutcome::Created`], failure → [`ReconcileError::Create`].
//! 4. Any other merge failure → [`ReconcileError::Merge`]; create is not tried.
//!
//! Merge comes first because it only needs a "not found" signal from the
//! store, and because an entity created by an earlier process is then just
//! updated instead of hitting a duplicate-create conflict.

use std::collections::BTreeMap;

use serde::Serialize;

use ingress_core::{CanonicalEntity, EntityFragment, EntityId};

use crate::error::{ReconcileError, StoreError};

/// Extra request headers passed to the store, by name.
pub type Headers = BTreeMap<String, Vec<String>>;

pub const LD_JSON: &str = "application/ld+json";

/// Entity store operations consumed by the reconciler.
pub trait EntityStore: Send {
    /// Merge `fragment` into the existing entity `id`. Must report a missing
    /// entity as [`StoreError::NotFound`].
    fn merge_entity(
        &self,
        id: &EntityId,
        fragment: &EntityFragment,
        headers: &Headers,
    ) -> Result<(), StoreError>;

    fn create_entity(&self, entity: &CanonicalEntity, headers: &Headers) -> Result<(), StoreError>;
}

/// How a single entity write ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Created,
    Updated,
    /// Status-only merge of a resolved record succeeded.
    Resolved,
    /// Resolution target is not in the store; nothing was written.
    NothingToResolve,
}

pub struct Reconciler<S> {
    store: S,
    headers: Headers,
}

impl<S: EntityStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), vec![LD_JSON.to_string()]);
        Self { store, headers }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Upsert `entity` (merge first, create on "not found").
    pub fn reconcile(&self, entity: &CanonicalEntity) -> Result<ReconcileOutcome, ReconcileError> {
        match self
            .store
            .merge_entity(&entity.id, &entity.fragment(), &self.headers)
        {
            Ok(()) => Ok(ReconcileOutcome::Updated),
            Err(err) if err.is_not_found() => {
                tracing::debug!(entity = %entity.id, "merge target missing, creating entity");
                self.store
                    .create_entity(entity, &self.headers)
                    .map(|()| ReconcileOutcome::Created)
                    .map_err(|source| ReconcileError::Create {
                        id: entity.id.clone(),
                        source,
                    })
            }
            Err(source) => Err(ReconcileError::Merge {
                id: entity.id.clone(),
                source,
            }),
        }
    }

    /// Merge a status-only fragment. Never creates: a missing entity has
    /// nothing to resolve.
    pub fn resolve(
        &self,
        id: &EntityId,
        fragment: &EntityFragment,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match self.store.merge_entity(id, fragment, &self.headers) {
            Ok(()) => Ok(ReconcileOutcome::Resolved),
            Err(err) if err.is_not_found() => Ok(ReconcileOutcome::NothingToResolve),
            Err(source) => Err(ReconcileError::Merge {
                id: id.clone(),
                source,
            }),
        }
    }
}
