/// Account deletion cascade
///
/// Removes everything a user owns leaf-first, then the identity, then the
/// session:
///
/// 1. payments, 2. job cards, 3. orders, 4. quotations, 5. leads,
/// 6. customers, 7. identity record, 8. session
///
/// Each step asks the store to delete "rows of kind K owned by user U" at
/// the moment it runs, so referential integrity holds after every step and
/// rows created mid-cascade are still caught by later steps.
///
/// # Failure handling
///
/// Under [`CascadePolicy::BestEffort`] a failed data step is logged and
/// recorded, and the cascade moves on; only a failed identity removal fails
/// the whole operation. Under [`CascadePolicy::HaltOnFailure`] the first
/// failed data step stops the cascade before the identity is touched, so
/// the account can be retried. A failed session invalidation is logged and
/// never fails the deletion.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Serialize, Serializer};
use uuid::Uuid;

use super::store::{AccountStore, EntityKind};
use crate::identity::{Identity, IdentityError, IdentityProvider};
use crate::models::text_enum;

/// Order in which owned data is removed
pub const DELETION_ORDER: [EntityKind; 6] = [
    EntityKind::Payments,
    EntityKind::JobCards,
    EntityKind::Orders,
    EntityKind::Quotations,
    EntityKind::Leads,
    EntityKind::Customers,
];

text_enum! {
    /// What a failed data step does to the rest of the cascade
    pub enum CascadePolicy {
        BestEffort => "best_effort",
        HaltOnFailure => "halt_on_failure",
    }
}

impl Default for CascadePolicy {
    fn default() -> Self {
        CascadePolicy::BestEffort
    }
}

/// One step of the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    Data(EntityKind),
    Identity,
    Session,
}

impl CascadeStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeStep::Data(kind) => kind.as_str(),
            CascadeStep::Identity => "identity",
            CascadeStep::Session => "session",
        }
    }
}

impl fmt::Display for CascadeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CascadeStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Result of one step
///
/// Failure reasons are kept for logs and callers in-process but are not
/// serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Deleted { rows: u64 },
    Completed,
    Failed {
        #[serde(skip_serializing)]
        reason: String,
    },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: CascadeStep,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Every step the cascade ran, failed or skipped, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub user_id: Uuid,
    pub policy: CascadePolicy,
    pub steps: Vec<StepReport>,
}

impl DeletionReport {
    fn new(user_id: Uuid, policy: CascadePolicy) -> Self {
        Self {
            user_id,
            policy,
            steps: Vec::with_capacity(DELETION_ORDER.len() + 2),
        }
    }

    fn push(&mut self, step: CascadeStep, outcome: StepOutcome) {
        self.steps.push(StepReport { step, outcome });
    }

    fn skip_from(&mut self, position: usize) {
        for kind in &DELETION_ORDER[position..] {
            self.push(CascadeStep::Data(*kind), StepOutcome::Skipped);
        }
        self.push(CascadeStep::Identity, StepOutcome::Skipped);
        self.push(CascadeStep::Session, StepOutcome::Skipped);
    }

    pub fn outcome(&self, step: CascadeStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.outcome)
    }

    /// Rows removed by a data step, None if it did not delete
    pub fn rows_deleted(&self, kind: EntityKind) -> Option<u64> {
        match self.outcome(CascadeStep::Data(kind)) {
            Some(StepOutcome::Deleted { rows }) => Some(*rows),
            _ => None,
        }
    }

    pub fn failed_steps(&self) -> Vec<CascadeStep> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
            .map(|s| s.step)
            .collect()
    }

    /// True when no step failed or was skipped
    pub fn is_clean(&self) -> bool {
        self.steps
            .iter()
            .all(|s| matches!(s.outcome, StepOutcome::Deleted { .. } | StepOutcome::Completed))
    }
}

/// Error type for account deletion
#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    /// Another deletion for the same user is running
    #[error("Account deletion already in progress")]
    AlreadyInProgress,

    /// The identity record could not be removed
    #[error("Failed to remove identity: {source}")]
    TerminalFailure {
        report: DeletionReport,
        source: IdentityError,
    },

    /// A data step failed under [`CascadePolicy::HaltOnFailure`]
    #[error("Deletion halted at {failed_step}")]
    Halted {
        report: DeletionReport,
        failed_step: EntityKind,
    },
}

impl DeletionError {
    pub fn report(&self) -> Option<&DeletionReport> {
        match self {
            DeletionError::AlreadyInProgress => None,
            DeletionError::TerminalFailure { report, .. } | DeletionError::Halted { report, .. } => {
                Some(report)
            }
        }
    }
}

/// Removes the in-flight marker when the cascade finishes or is dropped
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<Uuid>>,
    user_id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.user_id);
    }
}

/// Runs the deletion cascade against a store and an identity provider
pub struct AccountDeleter {
    store: Arc<dyn AccountStore>,
    identity: Arc<dyn IdentityProvider>,
    policy: CascadePolicy,
    in_flight: Mutex<HashSet<Uuid>>,
}

impl AccountDeleter {
    pub fn new(
        store: Arc<dyn AccountStore>,
        identity: Arc<dyn IdentityProvider>,
        policy: CascadePolicy,
    ) -> Self {
        Self {
            store,
            identity,
            policy,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn policy(&self) -> CascadePolicy {
        self.policy
    }

    fn begin(&self, user_id: Uuid) -> Option<InFlightGuard<'_>> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user_id);

        inserted.then_some(InFlightGuard {
            in_flight: &self.in_flight,
            user_id,
        })
    }

    /// Deletes everything `identity` owns, then the identity itself
    ///
    /// # Errors
    ///
    /// - [`DeletionError::AlreadyInProgress`] if a cascade for this user is
    ///   still running
    /// - [`DeletionError::Halted`] under `HaltOnFailure` when a data step
    ///   fails
    /// - [`DeletionError::TerminalFailure`] when the identity cannot be
    ///   removed
    pub async fn delete_account(&self, identity: &Identity) -> Result<DeletionReport, DeletionError> {
        let user_id = identity.user_id;

        let Some(_guard) = self.begin(user_id) else {
            tracing::warn!(user_id = %user_id, "Account deletion already in progress");
            return Err(DeletionError::AlreadyInProgress);
        };

        tracing::info!(
            user_id = %user_id,
            policy = %self.policy,
            provider = self.identity.name(),
            "Starting account deletion"
        );

        let mut report = DeletionReport::new(user_id, self.policy);

        for (position, kind) in DELETION_ORDER.iter().copied().enumerate() {
            match self.store.delete_owned(kind, user_id).await {
                Ok(rows) => {
                    tracing::debug!(user_id = %user_id, entity = %kind, rows, "Deleted owned rows");
                    report.push(CascadeStep::Data(kind), StepOutcome::Deleted { rows });
                }
                Err(e) => {
                    tracing::error!(
                        user_id = %user_id,
                        entity = %kind,
                        error = %e,
                        "Failed to delete owned rows"
                    );
                    report.push(
                        CascadeStep::Data(kind),
                        StepOutcome::Failed {
                            reason: e.to_string(),
                        },
                    );

                    if self.policy == CascadePolicy::HaltOnFailure {
                        report.skip_from(position + 1);
                        tracing::warn!(user_id = %user_id, entity = %kind, "Account deletion halted");
                        return Err(DeletionError::Halted {
                            report,
                            failed_step: kind,
                        });
                    }
                }
            }
        }

        if let Err(e) = self.identity.remove_identity(user_id).await {
            tracing::error!(user_id = %user_id, error = %e, "Failed to remove identity");
            report.push(
                CascadeStep::Identity,
                StepOutcome::Failed {
                    reason: e.to_string(),
                },
            );
            report.push(CascadeStep::Session, StepOutcome::Skipped);
            return Err(DeletionError::TerminalFailure { report, source: e });
        }
        report.push(CascadeStep::Identity, StepOutcome::Deleted { rows: 1 });

        match self.identity.invalidate_session(identity).await {
            Ok(()) => report.push(CascadeStep::Session, StepOutcome::Completed),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to invalidate session");
                report.push(
                    CascadeStep::Session,
                    StepOutcome::Failed {
                        reason: e.to_string(),
                    },
                );
            }
        }

        tracing::info!(
            user_id = %user_id,
            failed_steps = report.failed_steps().len(),
            "Account deletion finished"
        );

        Ok(report)
    }
}
