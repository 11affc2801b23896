/// In-memory [`AccountStore`]
///
/// Keeps the same tables and foreign keys as the PostgreSQL schema:
/// inserting a child requires its parent, and deleting a parent that still
/// has children fails with [`StoreError::ForeignKeyViolation`] without
/// removing anything. Every trait call is appended to a journal, and
/// failures can be injected per entity kind and operation.
///
/// # Example
///
/// ```
/// use printcrm_shared::account::memory::MemoryStore;
/// use printcrm_shared::account::store::{AccountStore, EntityKind};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let user = Uuid::new_v4();
/// let customer = store.add_customer(user, "Kumar Graphics");
/// store.add_order(customer)?;
///
/// // Customers cannot go while an order still references one
/// assert!(store.delete_owned(EntityKind::Customers, user).await.is_err());
/// assert_eq!(store.delete_owned(EntityKind::Orders, user).await?, 1);
/// assert_eq!(store.delete_owned(EntityKind::Customers, user).await?, 1);
/// # Ok(())
/// # }
/// ```

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::store::{AccountStore, EntityKind, StoreError, StoreOperation, StoreResult};
use crate::models::customer::{Customer, CustomerStatus};
use crate::models::job_card::{JobCard, JobCardStatus};
use crate::models::lead::{Lead, LeadStatus};
use crate::models::order::{generate_order_number, Order, OrderStatus};
use crate::models::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::models::quotation::{generate_quote_number, Quotation, QuotationStatus};

/// One recorded store call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOp {
    pub kind: EntityKind,
    pub operation: StoreOperation,
    pub user_id: Uuid,
}

#[derive(Default)]
struct Tables {
    customers: Vec<Customer>,
    orders: Vec<Order>,
    quotations: Vec<Quotation>,
    leads: Vec<Lead>,
    payments: Vec<Payment>,
    job_cards: Vec<JobCard>,
}

impl Tables {
    fn customer_ids_of(&self, user_id: Uuid) -> HashSet<Uuid> {
        self.customers
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.id)
            .collect()
    }

    fn order_ids_of(&self, user_id: Uuid) -> HashSet<Uuid> {
        let customers = self.customer_ids_of(user_id);
        self.orders
            .iter()
            .filter(|o| customers.contains(&o.customer_id))
            .map(|o| o.id)
            .collect()
    }

    fn len(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Customers => self.customers.len(),
            EntityKind::Orders => self.orders.len(),
            EntityKind::Quotations => self.quotations.len(),
            EntityKind::Leads => self.leads.len(),
            EntityKind::Payments => self.payments.len(),
            EntityKind::JobCards => self.job_cards.len(),
        }
    }

    /// Ids that rows of `kind` point at (the referenced parent ids)
    fn referenced_by(&self, kind: EntityKind) -> HashSet<Uuid> {
        match kind {
            EntityKind::Orders => self.orders.iter().map(|o| o.customer_id).collect(),
            EntityKind::Quotations => self.quotations.iter().map(|q| q.customer_id).collect(),
            EntityKind::Leads => self.leads.iter().map(|l| l.customer_id).collect(),
            EntityKind::Payments => self.payments.iter().map(|p| p.order_id).collect(),
            EntityKind::JobCards => self.job_cards.iter().map(|j| j.order_id).collect(),
            EntityKind::Customers => HashSet::new(),
        }
    }

    /// Fails if any child table still references one of `ids` of `kind`
    fn check_no_dependents(&self, kind: EntityKind, ids: &HashSet<Uuid>) -> StoreResult<()> {
        for child in EntityKind::ALL {
            if child.parent() != Some(kind) {
                continue;
            }
            if self.referenced_by(child).iter().any(|id| ids.contains(id)) {
                return Err(StoreError::ForeignKeyViolation(format!(
                    "delete on table \"{}\" violates foreign key constraint on table \"{}\"",
                    kind.table_name(),
                    child.table_name()
                )));
            }
        }
        Ok(())
    }

    fn delete_owned(&mut self, kind: EntityKind, user_id: Uuid) -> StoreResult<u64> {
        let before = self.len(kind);

        match kind {
            EntityKind::Customers => {
                let ids = self.customer_ids_of(user_id);
                self.check_no_dependents(kind, &ids)?;
                self.customers.retain(|c| !ids.contains(&c.id));
            }
            EntityKind::Orders => {
                let ids = self.order_ids_of(user_id);
                self.check_no_dependents(kind, &ids)?;
                self.orders.retain(|o| !ids.contains(&o.id));
            }
            EntityKind::Quotations => {
                let customers = self.customer_ids_of(user_id);
                self.quotations.retain(|q| !customers.contains(&q.customer_id));
            }
            EntityKind::Leads => {
                let customers = self.customer_ids_of(user_id);
                self.leads.retain(|l| !customers.contains(&l.customer_id));
            }
            EntityKind::Payments => {
                let orders = self.order_ids_of(user_id);
                self.payments.retain(|p| !orders.contains(&p.order_id));
            }
            EntityKind::JobCards => {
                let orders = self.order_ids_of(user_id);
                self.job_cards.retain(|j| !orders.contains(&j.order_id));
            }
        }

        Ok((before - self.len(kind)) as u64)
    }
}

/// Test double for [`AccountStore`]
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    journal: Mutex<Vec<StoreOp>>,
    failures: Mutex<HashSet<(EntityKind, StoreOperation)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn missing_parent(kind: EntityKind, id: Uuid) -> StoreError {
    StoreError::ForeignKeyViolation(format!(
        "insert references missing {} row {}",
        kind.table_name(),
        id
    ))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every future `operation` on `kind` fail
    pub fn fail_on(&self, kind: EntityKind, operation: StoreOperation) {
        lock(&self.failures).insert((kind, operation));
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Every trait call so far, in call order (seeding is not recorded)
    pub fn journal(&self) -> Vec<StoreOp> {
        lock(&self.journal).clone()
    }

    pub fn clear_journal(&self) {
        lock(&self.journal).clear();
    }

    /// Rows of `kind` across all users
    pub fn count(&self, kind: EntityKind) -> usize {
        lock(&self.tables).len(kind)
    }

    fn record(&self, kind: EntityKind, operation: StoreOperation, user_id: Uuid) -> StoreResult<()> {
        lock(&self.journal).push(StoreOp {
            kind,
            operation,
            user_id,
        });

        if lock(&self.failures).contains(&(kind, operation)) {
            return Err(StoreError::Unavailable(format!(
                "injected {:?} failure on {}",
                operation, kind
            )));
        }

        Ok(())
    }

    /// Seeds a customer owned by `user_id`
    pub fn add_customer(&self, user_id: Uuid, name: &str) -> Uuid {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            email: None,
            phone: None,
            company: None,
            address: None,
            status: CustomerStatus::Active.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        let id = customer.id;
        lock(&self.tables).customers.push(customer);
        id
    }

    /// Seeds an order; the customer must exist
    pub fn add_order(&self, customer_id: Uuid) -> StoreResult<Uuid> {
        let mut tables = lock(&self.tables);
        if !tables.customers.iter().any(|c| c.id == customer_id) {
            return Err(missing_parent(EntityKind::Customers, customer_id));
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer_id,
            order_number: generate_order_number(),
            product_type: "Flex banner".to_string(),
            quantity: 1,
            size: None,
            material: None,
            status: OrderStatus::Pending.as_str().to_string(),
            total_amount_cents: 0,
            advance_paid_cents: 0,
            delivery_date: None,
            created_at: now,
            updated_at: now,
        };
        let id = order.id;
        tables.orders.push(order);
        Ok(id)
    }

    /// Seeds a quotation with no items; the customer must exist
    pub fn add_quotation(&self, customer_id: Uuid) -> StoreResult<Uuid> {
        let mut tables = lock(&self.tables);
        if !tables.customers.iter().any(|c| c.id == customer_id) {
            return Err(missing_parent(EntityKind::Customers, customer_id));
        }

        let now = Utc::now();
        let quotation = Quotation {
            id: Uuid::new_v4(),
            customer_id,
            quote_number: generate_quote_number(),
            items: serde_json::json!([]),
            total_amount_cents: 0,
            status: QuotationStatus::Draft.as_str().to_string(),
            valid_until: Some((now + Duration::days(30)).date_naive()),
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let id = quotation.id;
        tables.quotations.push(quotation);
        Ok(id)
    }

    /// Seeds a lead; the customer must exist
    pub fn add_lead(&self, customer_id: Uuid) -> StoreResult<Uuid> {
        let mut tables = lock(&self.tables);
        if !tables.customers.iter().any(|c| c.id == customer_id) {
            return Err(missing_parent(EntityKind::Customers, customer_id));
        }

        let now = Utc::now();
        let lead = Lead {
            id: Uuid::new_v4(),
            customer_id,
            source: Some("walk-in".to_string()),
            status: LeadStatus::New.as_str().to_string(),
            estimated_value_cents: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let id = lead.id;
        tables.leads.push(lead);
        Ok(id)
    }

    /// Seeds a completed cash payment; the order must exist
    pub fn add_payment(&self, order_id: Uuid, amount_cents: i64) -> StoreResult<Uuid> {
        let mut tables = lock(&self.tables);
        if !tables.orders.iter().any(|o| o.id == order_id) {
            return Err(missing_parent(EntityKind::Orders, order_id));
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            order_id,
            amount_cents,
            method: PaymentMethod::Cash.as_str().to_string(),
            status: PaymentStatus::Completed.as_str().to_string(),
            payment_date: now.date_naive(),
            notes: None,
            created_at: now,
        };
        let id = payment.id;
        tables.payments.push(payment);
        Ok(id)
    }

    /// Seeds a job card; the order must exist
    pub fn add_job_card(&self, order_id: Uuid, title: &str) -> StoreResult<Uuid> {
        let mut tables = lock(&self.tables);
        if !tables.orders.iter().any(|o| o.id == order_id) {
            return Err(missing_parent(EntityKind::Orders, order_id));
        }

        let now = Utc::now();
        let job_card = JobCard {
            id: Uuid::new_v4(),
            order_id,
            title: title.to_string(),
            description: None,
            assigned_to: None,
            status: JobCardStatus::Open.as_str().to_string(),
            due_date: None,
            created_at: now,
            updated_at: now,
        };
        let id = job_card.id;
        tables.job_cards.push(job_card);
        Ok(id)
    }
}

/// Newest first, matching `ORDER BY created_at DESC` (ties by insertion)
fn newest_first<T>(rows: impl DoubleEndedIterator<Item = T>) -> Vec<T> {
    rows.rev().collect()
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn customers_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Customer>> {
        self.record(EntityKind::Customers, StoreOperation::Select, user_id)?;
        let tables = lock(&self.tables);
        Ok(newest_first(
            tables.customers.iter().filter(|c| c.user_id == user_id).cloned(),
        ))
    }

    async fn orders_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        self.record(EntityKind::Orders, StoreOperation::Select, user_id)?;
        let tables = lock(&self.tables);
        let customers = tables.customer_ids_of(user_id);
        Ok(newest_first(
            tables
                .orders
                .iter()
                .filter(|o| customers.contains(&o.customer_id))
                .cloned(),
        ))
    }

    async fn quotations_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Quotation>> {
        self.record(EntityKind::Quotations, StoreOperation::Select, user_id)?;
        let tables = lock(&self.tables);
        let customers = tables.customer_ids_of(user_id);
        Ok(newest_first(
            tables
                .quotations
                .iter()
                .filter(|q| customers.contains(&q.customer_id))
                .cloned(),
        ))
    }

    async fn leads_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Lead>> {
        self.record(EntityKind::Leads, StoreOperation::Select, user_id)?;
        let tables = lock(&self.tables);
        let customers = tables.customer_ids_of(user_id);
        Ok(newest_first(
            tables
                .leads
                .iter()
                .filter(|l| customers.contains(&l.customer_id))
                .cloned(),
        ))
    }

    async fn payments_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<Payment>> {
        self.record(EntityKind::Payments, StoreOperation::Select, user_id)?;
        let tables = lock(&self.tables);
        let orders = tables.order_ids_of(user_id);
        Ok(newest_first(
            tables
                .payments
                .iter()
                .filter(|p| orders.contains(&p.order_id))
                .cloned(),
        ))
    }

    async fn job_cards_owned_by(&self, user_id: Uuid) -> StoreResult<Vec<JobCard>> {
        self.record(EntityKind::JobCards, StoreOperation::Select, user_id)?;
        let tables = lock(&self.tables);
        let orders = tables.order_ids_of(user_id);
        Ok(newest_first(
            tables
                .job_cards
                .iter()
                .filter(|j| orders.contains(&j.order_id))
                .cloned(),
        ))
    }

    async fn delete_owned(&self, kind: EntityKind, user_id: Uuid) -> StoreResult<u64> {
        self.record(kind, StoreOperation::Delete, user_id)?;
        lock(&self.tables).delete_owned(kind, user_id)
    }
}
