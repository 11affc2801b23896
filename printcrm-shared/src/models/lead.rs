/// Lead model: a sales opportunity attached to a customer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::text_enum;

text_enum! {
    pub enum LeadStatus {
        New => "new",
        Contacted => "contacted",
        Qualified => "qualified",
        Converted => "converted",
        Lost => "lost",
    }
}

impl Default for LeadStatus {
    fn default() -> Self {
        LeadStatus::New
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub customer_id: Uuid,

    /// Where the enquiry came from (walk-in, referral, website)
    pub source: Option<String>,

    pub status: String,
    pub estimated_value_cents: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLead {
    pub customer_id: Uuid,
    pub source: Option<String>,
    #[serde(default)]
    pub status: LeadStatus,
    pub estimated_value_cents: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLead {
    pub source: Option<String>,
    pub status: Option<LeadStatus>,
    pub estimated_value_cents: Option<i64>,
    pub notes: Option<String>,
}

impl Lead {
    /// Returns None if the customer is missing or not owned by `user_id`
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        data: CreateLead,
    ) -> Result<Option<Self>, sqlx::Error> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (customer_id, source, status, estimated_value_cents, notes)
            SELECT $1, $2, $3, $4, $5
            WHERE EXISTS (SELECT 1 FROM customers WHERE id = $1 AND user_id = $6)
            RETURNING *
            "#,
        )
        .bind(data.customer_id)
        .bind(data.source)
        .bind(data.status.as_str())
        .bind(data.estimated_value_cents)
        .bind(data.notes)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(lead)
    }

    pub async fn list_owned_by(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            SELECT l.* FROM leads l
            JOIN customers c ON c.id = l.customer_id
            WHERE c.user_id = $1
            ORDER BY l.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(leads)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdateLead,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE leads SET updated_at = NOW()");

        if let Some(source) = data.source {
            query.push(", source = ").push_bind(source);
        }
        if let Some(status) = data.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(value) = data.estimated_value_cents {
            query.push(", estimated_value_cents = ").push_bind(value);
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

        let lead = query.build_query_as::<Lead>().fetch_optional(pool).await?;

        Ok(lead)
    }

    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM leads
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
            DELETE FROM leads
            WHERE customer_id IN (SELECT id FROM customers WHERE user_id = $1)
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
