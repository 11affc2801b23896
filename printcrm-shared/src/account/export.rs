/// Account data export
///
/// Builds one document holding everything a user owns: a profile snapshot,
/// metadata about the export, and one array per entity kind.
///
/// The six reads are independent and run concurrently. Export is
/// best-effort: a failed read is logged, its array is left empty, and the
/// kind is listed in `export_info.incomplete_sections` so the caller can
/// tell a partial document from a complete one.
///
/// # Example
///
/// ```
/// use printcrm_shared::account::export::export_account;
/// use printcrm_shared::account::memory::MemoryStore;
/// use printcrm_shared::identity::{Credentials, FixedIdentityProvider, IdentityProvider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let provider = FixedIdentityProvider::demo();
/// let identity = provider.current_identity(&Credentials::none()).await?;
///
/// let export = export_account(&store, &identity).await;
/// assert!(export.is_complete());
/// assert_eq!(export.export_info.total_records.customers, 0);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::store::{AccountStore, EntityKind, StoreResult};
use crate::identity::Identity;
use crate::models::customer::Customer;
use crate::models::job_card::JobCard;
use crate::models::lead::Lead;
use crate::models::order::Order;
use crate::models::payment::Payment;
use crate::models::quotation::Quotation;

/// Row counts per section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalRecords {
    pub customers: usize,
    pub orders: usize,
    pub quotations: usize,
    pub payments: usize,
    pub leads: usize,
    pub job_cards: usize,
}

impl TotalRecords {
    pub fn total(&self) -> usize {
        self.customers + self.orders + self.quotations + self.payments + self.leads + self.job_cards
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub exported_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub user_email: String,
    pub total_records: TotalRecords,

    /// Sections whose read failed; their arrays are empty
    pub incomplete_sections: Vec<EntityKind>,
}

/// Identity snapshot at export time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    pub user_metadata: JsonValue,
}

impl From<&Identity> for UserProfile {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.user_id,
            email: identity.email.clone(),
            created_at: identity.created_at,
            last_sign_in_at: identity.last_sign_in_at,
            user_metadata: identity.metadata.clone(),
        }
    }
}

/// The export document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountExport {
    pub export_info: ExportInfo,
    pub user_profile: UserProfile,
    pub customers: Vec<Customer>,
    pub orders: Vec<Order>,
    pub quotations: Vec<Quotation>,
    pub payments: Vec<Payment>,
    pub leads: Vec<Lead>,
    pub job_cards: Vec<JobCard>,
}

impl AccountExport {
    /// True when every section was read successfully
    pub fn is_complete(&self) -> bool {
        self.export_info.incomplete_sections.is_empty()
    }

    /// Two-space indented JSON, as served for download
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Download filename, e.g. `printcrm-data-export-2024-06-12.json`
pub fn export_filename(prefix: &str, date: NaiveDate) -> String {
    format!("{}-data-export-{}.json", prefix, date.format("%Y-%m-%d"))
}

fn section<T>(
    kind: EntityKind,
    user_id: Uuid,
    result: StoreResult<Vec<T>>,
    incomplete: &mut Vec<EntityKind>,
) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                entity = %kind,
                error = %e,
                "Export section failed, continuing with empty data"
            );
            incomplete.push(kind);
            Vec::new()
        }
    }
}

/// Reads everything `identity` owns into an [`AccountExport`]
///
/// Never fails as a whole; see the module docs for partial results.
pub async fn export_account(store: &dyn AccountStore, identity: &Identity) -> AccountExport {
    let user_id = identity.user_id;

    let (customers, orders, quotations, leads, payments, job_cards) = tokio::join!(
        store.customers_owned_by(user_id),
        store.orders_owned_by(user_id),
        store.quotations_owned_by(user_id),
        store.leads_owned_by(user_id),
        store.payments_owned_by(user_id),
        store.job_cards_owned_by(user_id),
    );

    let mut incomplete = Vec::new();
    let customers = section(EntityKind::Customers, user_id, customers, &mut incomplete);
    let orders = section(EntityKind::Orders, user_id, orders, &mut incomplete);
    let quotations = section(EntityKind::Quotations, user_id, quotations, &mut incomplete);
    let leads = section(EntityKind::Leads, user_id, leads, &mut incomplete);
    let payments = section(EntityKind::Payments, user_id, payments, &mut incomplete);
    let job_cards = section(EntityKind::JobCards, user_id, job_cards, &mut incomplete);

    let total_records = TotalRecords {
        customers: customers.len(),
        orders: orders.len(),
        quotations: quotations.len(),
        payments: payments.len(),
        leads: leads.len(),
        job_cards: job_cards.len(),
    };

    tracing::info!(
        user_id = %user_id,
        records = total_records.total(),
        incomplete = incomplete.len(),
        "Account export assembled"
    );

    AccountExport {
        export_info: ExportInfo {
            exported_at: Utc::now(),
            user_id,
            user_email: identity.email.clone(),
            total_records,
            incomplete_sections: incomplete,
        },
        user_profile: UserProfile::from(identity),
        customers,
        orders,
        quotations,
        payments,
        leads,
        job_cards,
    }
}
