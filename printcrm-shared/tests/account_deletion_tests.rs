/// Account deletion cascade against the in-memory store
///
/// The in-memory store enforces the same foreign keys as PostgreSQL, so a
/// cascade that ran out of order would fail here rather than leave orphans.
///
/// Run with: cargo test --test account_deletion_tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use printcrm_shared::account::deletion::{
    AccountDeleter, CascadePolicy, CascadeStep, DeletionError, StepOutcome, DELETION_ORDER,
};
use printcrm_shared::account::memory::MemoryStore;
use printcrm_shared::account::store::{EntityKind, StoreOperation};
use printcrm_shared::identity::{
    Credentials, FixedIdentityProvider, Identity, IdentityError, IdentityProvider,
};
use tokio::sync::Notify;
use uuid::Uuid;

/// Wraps a fixed provider and records what the store looked like when the
/// identity was removed
struct RecordingProvider {
    inner: FixedIdentityProvider,
    store: Arc<MemoryStore>,
    events: Mutex<Vec<&'static str>>,
    rows_left_at_removal: Mutex<Option<usize>>,
}

impl RecordingProvider {
    fn new(inner: FixedIdentityProvider, store: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            store,
            events: Mutex::new(Vec::new()),
            rows_left_at_removal: Mutex::new(None),
        }
    }

    fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    fn rows_left_at_removal(&self) -> Option<usize> {
        *self.rows_left_at_removal.lock().unwrap()
    }
}

#[async_trait]
impl IdentityProvider for RecordingProvider {
    async fn current_identity(&self, credentials: &Credentials) -> Result<Identity, IdentityError> {
        self.inner.current_identity(credentials).await
    }

    async fn remove_identity(&self, user_id: Uuid) -> Result<(), IdentityError> {
        let remaining: usize = EntityKind::ALL.iter().map(|k| self.store.count(*k)).sum();
        *self.rows_left_at_removal.lock().unwrap() = Some(remaining);
        self.events.lock().unwrap().push("remove_identity");
        self.inner.remove_identity(user_id).await
    }

    async fn invalidate_session(&self, identity: &Identity) -> Result<(), IdentityError> {
        self.events.lock().unwrap().push("invalidate_session");
        self.inner.invalidate_session(identity).await
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    provider: Arc<RecordingProvider>,
    deleter: AccountDeleter,
    identity: Identity,
}

async fn fixture_with(inner: FixedIdentityProvider, policy: CascadePolicy) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(RecordingProvider::new(inner, store.clone()));
    let identity = provider
        .current_identity(&Credentials::none())
        .await
        .expect("identity should resolve");
    let deleter = AccountDeleter::new(store.clone(), provider.clone(), policy);

    Fixture {
        store,
        provider,
        deleter,
        identity,
    }
}

async fn fixture(policy: CascadePolicy) -> Fixture {
    fixture_with(FixedIdentityProvider::demo(), policy).await
}

/// U1 -> C1 -> O1 -> P1
fn seed_chain(store: &MemoryStore, user_id: Uuid) {
    let customer = store.add_customer(user_id, "C1");
    let order = store.add_order(customer).unwrap();
    store.add_payment(order, 12_500).unwrap();
}

fn delete_order_in_journal(store: &MemoryStore) -> Vec<EntityKind> {
    store
        .journal()
        .iter()
        .filter(|op| op.operation == StoreOperation::Delete)
        .map(|op| op.kind)
        .collect()
}

#[tokio::test]
async fn test_single_chain_deleted_leaf_first() {
    let f = fixture(CascadePolicy::BestEffort).await;
    seed_chain(&f.store, f.identity.user_id);

    let report = f.deleter.delete_account(&f.identity).await.unwrap();

    assert_eq!(delete_order_in_journal(&f.store), DELETION_ORDER.to_vec());
    assert_eq!(report.rows_deleted(EntityKind::Payments), Some(1));
    assert_eq!(report.rows_deleted(EntityKind::Orders), Some(1));
    assert_eq!(report.rows_deleted(EntityKind::Customers), Some(1));
    assert_eq!(report.rows_deleted(EntityKind::JobCards), Some(0));
    assert!(report.is_clean());

    assert_eq!(f.provider.rows_left_at_removal(), Some(0));
    assert_eq!(f.provider.events(), vec!["remove_identity", "invalidate_session"]);
    for kind in EntityKind::ALL {
        assert_eq!(f.store.count(kind), 0, "{} should be empty", kind);
    }
}

#[tokio::test]
async fn test_full_account_removed_without_fk_violations() {
    let f = fixture(CascadePolicy::BestEffort).await;
    let user = f.identity.user_id;

    for name in ["Apex Signs", "Bright Boards"] {
        let customer = f.store.add_customer(user, name);
        f.store.add_quotation(customer).unwrap();
        f.store.add_lead(customer).unwrap();
        for _ in 0..2 {
            let order = f.store.add_order(customer).unwrap();
            f.store.add_payment(order, 1_000).unwrap();
            f.store.add_job_card(order, "Print").unwrap();
            f.store.add_job_card(order, "Laminate").unwrap();
        }
    }

    let report = f.deleter.delete_account(&f.identity).await.unwrap();

    assert!(report.failed_steps().is_empty());
    assert_eq!(report.rows_deleted(EntityKind::Payments), Some(4));
    assert_eq!(report.rows_deleted(EntityKind::JobCards), Some(8));
    assert_eq!(report.rows_deleted(EntityKind::Orders), Some(4));
    assert_eq!(report.rows_deleted(EntityKind::Quotations), Some(2));
    assert_eq!(report.rows_deleted(EntityKind::Leads), Some(2));
    assert_eq!(report.rows_deleted(EntityKind::Customers), Some(2));
    assert_eq!(report.outcome(CascadeStep::Identity), Some(&StepOutcome::Deleted { rows: 1 }));
    assert_eq!(report.outcome(CascadeStep::Session), Some(&StepOutcome::Completed));
}

#[tokio::test]
async fn test_other_users_data_untouched() {
    let f = fixture(CascadePolicy::BestEffort).await;
    seed_chain(&f.store, f.identity.user_id);
    let neighbour = Uuid::new_v4();
    seed_chain(&f.store, neighbour);

    f.deleter.delete_account(&f.identity).await.unwrap();

    assert_eq!(f.store.count(EntityKind::Customers), 1);
    assert_eq!(f.store.count(EntityKind::Orders), 1);
    assert_eq!(f.store.count(EntityKind::Payments), 1);
}

#[tokio::test]
async fn test_empty_account_still_removes_identity() {
    let f = fixture(CascadePolicy::BestEffort).await;

    let report = f.deleter.delete_account(&f.identity).await.unwrap();

    for kind in DELETION_ORDER {
        assert_eq!(report.rows_deleted(kind), Some(0));
    }
    assert_eq!(f.provider.events(), vec!["remove_identity", "invalidate_session"]);
}

#[tokio::test]
async fn test_second_deletion_sees_unauthenticated_caller() {
    let f = fixture(CascadePolicy::BestEffort).await;
    seed_chain(&f.store, f.identity.user_id);

    f.deleter.delete_account(&f.identity).await.unwrap();

    assert!(matches!(
        f.provider.current_identity(&Credentials::none()).await,
        Err(IdentityError::Unauthenticated(_))
    ));

    // A stale identity can no longer be removed
    let again = f.deleter.delete_account(&f.identity).await;
    assert!(matches!(
        again,
        Err(DeletionError::TerminalFailure {
            source: IdentityError::NotFound,
            ..
        })
    ));
}

#[tokio::test]
async fn test_best_effort_continues_past_failed_step() {
    let f = fixture(CascadePolicy::BestEffort).await;
    seed_chain(&f.store, f.identity.user_id);
    f.store.fail_on(EntityKind::Payments, StoreOperation::Delete);

    let report = f.deleter.delete_account(&f.identity).await.unwrap();

    // payments stay, so orders and then customers are refused by the FKs
    assert_eq!(
        report.failed_steps(),
        vec![
            CascadeStep::Data(EntityKind::Payments),
            CascadeStep::Data(EntityKind::Orders),
            CascadeStep::Data(EntityKind::Customers),
        ]
    );
    assert_eq!(delete_order_in_journal(&f.store), DELETION_ORDER.to_vec());
    assert_eq!(f.provider.events(), vec!["remove_identity", "invalidate_session"]);
    assert_eq!(f.store.count(EntityKind::Payments), 1);
}

#[tokio::test]
async fn test_halt_on_failure_keeps_account() {
    let f = fixture(CascadePolicy::HaltOnFailure).await;
    seed_chain(&f.store, f.identity.user_id);
    f.store.fail_on(EntityKind::JobCards, StoreOperation::Delete);

    let err = f.deleter.delete_account(&f.identity).await.unwrap_err();

    match &err {
        DeletionError::Halted {
            failed_step,
            report,
        } => {
            assert_eq!(*failed_step, EntityKind::JobCards);
            assert_eq!(report.rows_deleted(EntityKind::Payments), Some(1));
            assert_eq!(report.outcome(CascadeStep::Identity), Some(&StepOutcome::Skipped));
            assert_eq!(report.outcome(CascadeStep::Session), Some(&StepOutcome::Skipped));
            assert_eq!(report.steps.len(), DELETION_ORDER.len() + 2);
        }
        other => panic!("expected Halted, got {:?}", other),
    }

    assert!(f.provider.events().is_empty());
    assert_eq!(
        delete_order_in_journal(&f.store),
        vec![EntityKind::Payments, EntityKind::JobCards]
    );
    assert_eq!(f.store.count(EntityKind::Orders), 1);
    assert_eq!(f.store.count(EntityKind::Customers), 1);

    // Retry once the store recovers
    f.store.clear_failures();
    let report = f.deleter.delete_account(&f.identity).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.rows_deleted(EntityKind::Payments), Some(0));
    assert_eq!(report.rows_deleted(EntityKind::Customers), Some(1));
}

#[tokio::test]
async fn test_identity_removal_failure_is_terminal() {
    let f = fixture_with(
        FixedIdentityProvider::demo().failing_removal("identity backend unavailable"),
        CascadePolicy::BestEffort,
    )
    .await;
    seed_chain(&f.store, f.identity.user_id);

    let err = f.deleter.delete_account(&f.identity).await.unwrap_err();

    let report = err.report().expect("terminal failure carries a report");
    assert!(matches!(
        report.outcome(CascadeStep::Identity),
        Some(StepOutcome::Failed { .. })
    ));
    assert_eq!(report.outcome(CascadeStep::Session), Some(&StepOutcome::Skipped));
    assert_eq!(f.provider.events(), vec!["remove_identity"]);
    assert!(f.provider.inner.is_present().await);
    assert_eq!(f.store.count(EntityKind::Customers), 0);
}

#[tokio::test]
async fn test_session_invalidation_failure_is_not_fatal() {
    let f = fixture_with(
        FixedIdentityProvider::demo().failing_invalidation("session store timeout"),
        CascadePolicy::BestEffort,
    )
    .await;

    let report = f.deleter.delete_account(&f.identity).await.unwrap();

    assert_eq!(report.outcome(CascadeStep::Identity), Some(&StepOutcome::Deleted { rows: 1 }));
    assert_eq!(report.failed_steps(), vec![CascadeStep::Session]);
}

/// Provider whose removal blocks until released
struct GatedProvider {
    inner: FixedIdentityProvider,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl IdentityProvider for GatedProvider {
    async fn current_identity(&self, credentials: &Credentials) -> Result<Identity, IdentityError> {
        self.inner.current_identity(credentials).await
    }

    async fn remove_identity(&self, user_id: Uuid) -> Result<(), IdentityError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.remove_identity(user_id).await
    }

    async fn invalidate_session(&self, identity: &Identity) -> Result<(), IdentityError> {
        self.inner.invalidate_session(identity).await
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

#[tokio::test]
async fn test_concurrent_deletion_rejected() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(GatedProvider {
        inner: FixedIdentityProvider::demo(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let identity = provider.current_identity(&Credentials::none()).await.unwrap();
    let deleter = Arc::new(AccountDeleter::new(
        store.clone(),
        provider.clone(),
        CascadePolicy::BestEffort,
    ));

    let first = tokio::spawn({
        let deleter = deleter.clone();
        let identity = identity.clone();
        async move { deleter.delete_account(&identity).await }
    });

    provider.entered.notified().await;
    let second = deleter.delete_account(&identity).await;
    assert!(matches!(second, Err(DeletionError::AlreadyInProgress)));

    provider.release.notify_one();
    let first = first.await.expect("task panicked");
    assert!(first.is_ok());

    // Guard released: a later attempt runs (and fails on the removed identity)
    provider.release.notify_one();
    assert!(matches!(
        deleter.delete_account(&identity).await,
        Err(DeletionError::TerminalFailure { .. })
    ));
}
