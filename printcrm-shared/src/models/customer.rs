/// Customer model and database operations
///
/// Customers are owned directly by a user (`customers.user_id`) and are the
/// parent of orders, quotations and leads. A customer that still has any of
/// those cannot be deleted: the foreign keys reject it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::text_enum;

text_enum! {
    /// Whether the shop still works with a customer
    pub enum CustomerStatus {
        Active => "active",
        Inactive => "inactive",
    }
}

impl Default for CustomerStatus {
    fn default() -> Self {
        CustomerStatus::Active
    }
}

/// Customer row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,

    /// One of [`CustomerStatus`]
    pub status: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub status: CustomerStatus,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub status: Option<CustomerStatus>,
}

impl Customer {
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        data: CreateCustomer,
    ) -> Result<Self, sqlx::Error> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (user_id, name, email, phone, company, address, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(data.name)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.company)
        .bind(data.address)
        .bind(data.status.as_str())
        .fetch_one(pool)
        .await?;

        Ok(customer)
    }

    /// Finds a customer only if `user_id` owns it
    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(customer)
    }

    /// All customers of a user, newest first
    pub async fn list_owned_by(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(customers)
    }

    /// Applies a partial update; None if the customer is missing or not owned
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdateCustomer,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE customers SET updated_at = NOW()");

        if let Some(name) = data.name {
            query.push(", name = ").push_bind(name);
        }
        if let Some(email) = data.email {
            query.push(", email = ").push_bind(email);
        }
        if let Some(phone) = data.phone {
            query.push(", phone = ").push_bind(phone);
        }
        if let Some(company) = data.company {
            query.push(", company = ").push_bind(company);
        }
        if let Some(address) = data.address {
            query.push(", address = ").push_bind(address);
        }
        if let Some(status) = data.status {
            query.push(", status = ").push_bind(status.as_str());
        }

        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(" RETURNING *");

        let customer = query
            .build_query_as::<Customer>()
            .fetch_optional(pool)
            .await?;

        Ok(customer)
    }

    /// Deletes one owned customer
    ///
    /// # Errors
    ///
    /// Foreign key violation while orders, quotations or leads still
    /// reference the customer.
    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every customer of a user, returning the row count
    pub async fn delete_owned_by(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
