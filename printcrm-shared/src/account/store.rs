/// Ownership-scoped data access for account workflows
///
/// [`AccountStore`] is the narrow view of the database that export and
/// deletion need: "everything of kind K owned by user U", for reading and
/// for bulk deletion. Ownership is always evaluated by the store at the
/// moment of the call, never from ids collected earlier.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::customer::Customer;
use crate::models::job_card::JobCard;
use crate::models::lead::Lead;
use crate::models::order::Order;
use crate::models::payment::Payment;
use crate::models::quotation::Quotation;

/// PostgreSQL SQLSTATE for foreign_key_violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Business entity types owned (directly or transitively) by a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customers,
    Orders,
    Quotations,
    Leads,
    Payments,
    JobCards,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Customers,
        EntityKind::Orders,
        EntityKind::Quotations,
        EntityKind::Leads,
        EntityKind::Payments,
        EntityKind::JobCards,
    ];

    /// Name used in documents, reports and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Customers => "customers",
            EntityKind::Orders => "orders",
            EntityKind::Quotations => "quotations",
            EntityKind::Leads => "leads",
            EntityKind::Payments => "payments",
            EntityKind::JobCards => "job_cards",
        }
    }

    pub fn table_name(&self) -> &'static str {
        self.as_str()
    }

    /// Entity this one references, None for customers (owned by the user)
    pub fn parent(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Customers => None,
            EntityKind::Orders | EntityKind::Quotations | EntityKind::Leads => {
                Some(EntityKind::Customers)
            }
            EntityKind::Payments | EntityKind::JobCards => Some(EntityKind::Orders),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of store call, for journals and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Select,
    Delete,
}

/// Error type for store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The delete would leave rows pointing at a missing parent
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Database error: {0}")]
    Database(String),

    /// The store could not be reached or refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        let is_fk_violation = e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code == FOREIGN_KEY_VIOLATION)
            .unwrap_or(false);

        if is_fk_violation {
            StoreError::ForeignKeyViolation(e.to_string())
        } else {
            StoreError::Database(e.to_string())
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Reads and bulk deletes scoped by the ownership chain
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn customers_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Customer>>;
    async fn orders_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;
    async fn quotations_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Quotation>>;
    async fn leads_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Lead>>;
    async fn payments_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Payment>>;
    async fn job_cards_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<JobCard>>;

    /// Deletes every row of `kind` owned by `user_id`, returning the count
    ///
    /// Deleting zero rows is success. Fails with
    /// [`StoreError::ForeignKeyViolation`] if dependents still exist.
    async fn delete_owned(&self, kind: EntityKind, user_id: Uuid) -> StoreResult<u64>;
}

/// [`AccountStore`] over the PostgreSQL schema
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn customers_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Customer>> {
        Ok(Customer::list_owned_by(&self.pool, user_id).await?)
    }

    async fn orders_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        Ok(Order::list_owned_by(&self.pool, user_id).await?)
    }

    async fn quotations_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Quotation>> {
        Ok(Quotation::list_owned_by(&self.pool, user_id).await?)
    }

    async fn leads_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Lead>> {
        Ok(Lead::list_owned_by(&self.pool, user_id).await?)
    }

    async fn payments_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Payment>> {
        Ok(Payment::list_owned_by(&self.pool, user_id).await?)
    }

    async fn job_cards_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<JobCard>> {
        Ok(JobCard::list_owned_by(&self.pool, user_id).await?)
    }

    async fn delete_owned(&self, kind: EntityKind, user_id: Uuid) -> StoreResult<u64> {
        let rows = match kind {
            EntityKind::Customers => Customer::delete_owned_by(&self.pool, user_id).await?,
            EntityKind::Orders => Order::delete_owned_by(&self.pool, user_id).await?,
            EntityKind::Quotations => Quotation::delete_owned_by(&self.pool, user_id).await?,
            EntityKind::Leads => Lead::delete_owned_by(&self.pool, user_id).await?,
            EntityKind::Payments => Payment::delete_owned_by(&self.pool, user_id).await?,
            EntityKind::JobCards => JobCard::delete_owned_by(&self.pool, user_id).await?,
        };

        Ok(rows)
    }
}
