/// Quotation model and database operations
///
/// A quotation lists priced line items for a customer. Items are stored as
/// a JSONB array; the total is always recomputed from them server-side so a
/// client cannot submit a total that disagrees with its lines.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{document_number, text_enum};

text_enum! {
    pub enum QuotationStatus {
        Draft => "draft",
        Sent => "sent",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

impl Default for QuotationStatus {
    fn default() -> Self {
        QuotationStatus::Draft
    }
}

/// One priced line of a quotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationItem {
    pub product_type: String,
    pub quantity: i32,
    pub size: Option<String>,
    pub material: Option<String>,
    pub unit_price_cents: i64,
}

impl QuotationItem {
    /// None when quantity times unit price does not fit in an `i64`
    pub fn line_total_cents(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.unit_price_cents)
    }
}

/// Sum of all line totals, or None on overflow
pub fn items_total_cents(items: &[QuotationItem]) -> Option<i64> {
    items
        .iter()
        .try_fold(0i64, |total, item| total.checked_add(item.line_total_cents()?))
}

fn checked_total(items: &[QuotationItem]) -> Result<i64, sqlx::Error> {
    items_total_cents(items)
        .ok_or_else(|| sqlx::Error::Protocol("quotation total overflows i64".to_string()))
}

/// Quotation row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Quotation {
    pub id: Uuid,
    pub customer_id: Uuid,

    /// `QUO-<unix-millis>-<4 hex>`
    pub quote_number: String,

    /// Array of [`QuotationItem`]
    pub items: JsonValue,

    pub total_amount_cents: i64,

    /// One of [`QuotationStatus`]
    pub status: String,

    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuotation {
    pub customer_id: Uuid,
    pub items: Vec<QuotationItem>,
    #[serde(default)]
    pub status: QuotationStatus,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateQuotation {
    /// Replaces all items and recomputes the total
    pub items: Option<Vec<QuotationItem>>,
    pub status: Option<QuotationStatus>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
}

pub fn generate_quote_number() -> String {
    document_number("QUO")
}

impl Quotation {
    /// Creates a quotation for a customer owned by `user_id`
    ///
    /// Returns None if the customer is missing or not owned.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        data: CreateQuotation,
    ) -> Result<Option<Self>, sqlx::Error> {
        let total = checked_total(&data.items)?;

        let quotation = sqlx::query_as::<_, Quotation>(
            r#"
            INSERT INTO quotations (
                customer_id, quote_number, items, total_amount_cents,
                status, valid_until, notes
            )
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE EXISTS (SELECT 1 FROM customers WHERE id = $1 AND user_id = $8)
            RETURNING *
            "#,
        )
        .bind(data.customer_id)
        .bind(generate_quote_number())
        .bind(Json(&data.items))
        .bind(total)
        .bind(data.status.as_str())
        .bind(data.valid_until)
        .bind(data.notes)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(quotation)
    }

    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let quotation = sqlx::query_as::<_, Quotation>(
            r#"
            SELECT q.* FROM quotations q
            JOIN customers c ON c.id = q.customer_id
            WHERE q.id = $1 AND c.user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(quotation)
    }

    pub async fn list_owned_by(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let quotations = sqlx::query_as::<_, Quotation>(
            r#"
            SELECT q.* FROM quotations q
            JOIN customers c ON c.id = q.customer_id
            WHERE c.user_id = $1
            ORDER BY q.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(quotations)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdateQuotation,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE quotations SET updated_at = NOW()");

        if let Some(items) = data.items {
            let total = checked_total(&items)?;
            query.push(", items = ").push_bind(Json(items));
            query.push(", total_amount_cents = ").push_bind(total);
        }
        if let Some(status) = data.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(valid_until) = data.valid_until {
            query.push(", valid_until = ").push_bind(valid_until);
        }
        if let Some(notes) = data.notes {
            query.push(", notes = ").push_bind(notes);
        }

        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND customer_id IN (SELECT id FROM customers WHERE user_id = ")
            .push_bind(user_id)
            .push(") RETURNING *");

        let quotation = query
            .build_query_as::<Quotation>()
            .fetch_optional(pool)
            .await?;

        Ok(quotation)
    }

    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM quotations
            WHERE id = $1
              AND customer_id IN (SELECT id FROM customers WHERE user_id = $2)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_owned_by(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM quotations
            WHERE customer_id IN (SELECT id FROM customers WHERE user_id = $1)
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
