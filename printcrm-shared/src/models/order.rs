/// Order model and database operations
///
/// An order belongs to a customer and is the parent of payments and job
/// cards. Ownership is never stored on the order itself; every query
/// reaches the owning user through `customers`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{document_number, text_enum};

text_enum! {
    /// Production state of an order
    pub enum OrderStatus {
        Pending => "pending",
        InProduction => "in_production",
        Completed => "completed",
        Delivered => "delivered",
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// Order row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,

    /// `ORD-<unix-millis>-<4 hex>`, generated on insert
    pub order_number: String,

    pub product_type: String,
    pub quantity: i32,
    pub size: Option<String>,
    pub material: Option<String>,

    /// One of [`OrderStatus`]
    pub status: String,

    pub total_amount_cents: i64,
    pub advance_paid_cents: i64,
    pub delivery_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrder {
    pub customer_id: Uuid,
    pub product_type: String,
    pub quantity: i32,
    pub size: Option<String>,
    pub material: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub total_amount_cents: i64,
    #[serde(default)]
    pub advance_paid_cents: i64,
    pub delivery_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrder {
    pub product_type: Option<String>,
    pub quantity: Option<i32>,
    pub size: Option<String>,
    pub material: Option<String>,
    pub status: Option<OrderStatus>,
    pub total_amount_cents: Option<i64>,
    pub advance_paid_cents: Option<i64>,
    pub delivery_date: Option<NaiveDate>,
}

/// New order number, e.g. `ORD-1718000000000-3FA2`
pub fn generate_order_number() -> String {
    document_number("ORD")
}

impl Order {
    /// Amount still owed after the advance
    pub fn balance_due_cents(&self) -> i64 {
        (self.total_amount_cents - self.advance_paid_cents).max(0)
    }

    /// Creates an order for a customer owned by `user_id`
    ///
    /// Returns None (and inserts nothing) if the customer does not exist or
    /// belongs to someone else.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        data: CreateOrder,
    ) -> Result<Option<Self>, sqlx::Error> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                customer_id, order_number, product_type, quantity, size, material,
                status, total_amount_cents, advance_paid_cents, delivery_date
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
            WHERE EXISTS (SELECT 1 FROM customers WHERE id = $1 AND user_id = $11)
            RETURNING *
            "#,
        )
        .bind(data.customer_id)
        .bind(generate_order_number())
        .bind(data.product_type)
        .bind(data.quantity)
        .bind(data.size)
        .bind(data.material)
        .bind(data.status.as_str())
        .bind(data.total_amount_cents)
        .bind(data.advance_paid_cents)
        .bind(data.delivery_date)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(order)
    }

    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT o.* FROM orders o
            JOIN customers c ON c.id = o.customer_id
            WHERE o.id = $1 AND c.user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(order)
    }

    /// Orders of a user, newest first, optionally narrowed to one status
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT o.* FROM orders o
            JOIN customers c ON c.id = o.customer_id
            WHERE c.user_id = $1
              AND ($2::text IS NULL OR o.status = $2)
            ORDER BY o.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await?;

        Ok(orders)
    }

    pub async fn list_owned_by(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        Self::list_for_user(pool, user_id, None).await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdateOrder,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE orders SET updated_at = NOW()");

        if let Some(product_type) = data.product_type {
            query.push(", product_type = ").push_bind(product_type);
        }
        if let Some(quantity) = data.quantity {
            query.push(", quantity = ").push_bind(quantity);
        }
        if let Some(size) = data.size {
            query.push(", size = ").push_bind(size);
        }
        if let Some(material) = data.material {
            query.push(", material = ").push_bind(material);
        }
        if let Some(status) = data.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(total) = data.total_amount_cents {
            query.push(", total_amount_cents = ").push_bind(total);
        }
        if let Some(advance) = data.advance_paid_cents {
            query.push(", advance_paid_cents = ").push_bind(advance);
        }
        if let Some(delivery_date) = data.delivery_date {
            query.push(", delivery_date = ").push_bind(delivery_date);
        }

        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND customer_id IN (SELECT id FROM customers WHERE user_id = ")
            .push_bind(user_id)
            .push(") RETURNING *");

        let order = query.build_query_as::<Order>().fetch_optional(pool).await?;

        Ok(order)
    }

    /// Deletes one owned order (rejected while payments or job cards remain)
    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM orders
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
            DELETE FROM orders
            WHERE customer_id IN (SELECT id FROM customers WHERE user_id = $1)
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
