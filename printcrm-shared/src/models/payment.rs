/// Payment model and database operations
///
/// Payments are leaf records: they belong to an order and nothing depends
/// on them. The owning user is two hops away (order, then customer).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::text_enum;

text_enum! {
    pub enum PaymentStatus {
        Completed => "completed",
        Pending => "pending",
        Failed => "failed",
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

text_enum! {
    pub enum PaymentMethod {
        Cash => "cash",
        Card => "card",
        BankTransfer => "bank_transfer",
        Upi => "upi",
        Cheque => "cheque",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount_cents: i64,

    /// One of [`PaymentMethod`]
    pub method: String,

    /// One of [`PaymentStatus`]
    pub status: String,

    pub payment_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePayment {
    pub order_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub status: PaymentStatus,

    /// Defaults to today
    pub payment_date: Option<NaiveDate>,

    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePayment {
    pub amount_cents: Option<i64>,
    pub method: Option<PaymentMethod>,
    pub status: Option<PaymentStatus>,
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl Payment {
    /// Records a payment against an order owned by `user_id`
    ///
    /// Returns None if the order is missing or not owned.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        data: CreatePayment,
    ) -> Result<Option<Self>, sqlx::Error> {
        let payment_date = data
            .payment_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (order_id, amount_cents, method, status, payment_date, notes)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE EXISTS (
                SELECT 1 FROM orders o
                JOIN customers c ON c.id = o.customer_id
                WHERE o.id = $1 AND c.user_id = $7
            )
            RETURNING *
            "#,
        )
        .bind(data.order_id)
        .bind(data.amount_cents)
        .bind(data.method.as_str())
        .bind(data.status.as_str())
        .bind(payment_date)
        .bind(data.notes)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(payment)
    }

    /// Payments of a user, newest first, optionally narrowed to one status
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT p.* FROM payments p
            JOIN orders o ON o.id = p.order_id
            JOIN customers c ON c.id = o.customer_id
            WHERE c.user_id = $1
              AND ($2::text IS NULL OR p.status = $2)
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await?;

        Ok(payments)
    }

    pub async fn list_owned_by(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        Self::list_for_user(pool, user_id, None).await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdatePayment,
    ) -> Result<Option<Self>, sqlx::Error> {
        // payments carry no updated_at; the leading no-op keeps every
        // optional assignment in the same ", col = $n" shape
        let mut query = QueryBuilder::<Postgres>::new("UPDATE payments SET id = id");

        if let Some(amount) = data.amount_cents {
            query.push(", amount_cents = ").push_bind(amount);
        }
        if let Some(method) = data.method {
            query.push(", method = ").push_bind(method.as_str());
        }
        if let Some(status) = data.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(payment_date) = data.payment_date {
            query.push(", payment_date = ").push_bind(payment_date);
        }
        if let Some(notes) = data.notes {
            query.push(", notes = ").push_bind(notes);
        }

        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(
                " AND order_id IN (SELECT o.id FROM orders o \
                 JOIN customers c ON c.id = o.customer_id WHERE c.user_id = ",
            )
            .push_bind(user_id)
            .push(") RETURNING *");

        let payment = query.build_query_as::<Payment>().fetch_optional(pool).await?;

        Ok(payment)
    }

    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM payments
            WHERE id = $1
              AND order_id IN (
                  SELECT o.id FROM orders o
                  JOIN customers c ON c.id = o.customer_id
                  WHERE c.user_id = $2
              )
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
            DELETE FROM payments
            WHERE order_id IN (
                SELECT o.id FROM orders o
                JOIN customers c ON c.id = o.customer_id
                WHERE c.user_id = $1
            )
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
