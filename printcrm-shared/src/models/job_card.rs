/// Job card model: a unit of shop-floor work for an order

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::text_enum;

text_enum! {
    pub enum JobCardStatus {
        Open => "open",
        InProgress => "in_progress",
        Done => "done",
    }
}

impl Default for JobCardStatus {
    fn default() -> Self {
        JobCardStatus::Open
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobCard {
    pub id: Uuid,
    pub order_id: Uuid,
    pub title: String,
    pub description: Option<String>,

    /// Free-text name of the operator or machine
    pub assigned_to: Option<String>,

    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobCard {
    pub order_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub status: JobCardStatus,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateJobCard {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub status: Option<JobCardStatus>,
    pub due_date: Option<NaiveDate>,
}

impl JobCard {
    /// Returns None if the order is missing or not owned by `user_id`
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        data: CreateJobCard,
    ) -> Result<Option<Self>, sqlx::Error> {
        let job_card = sqlx::query_as::<_, JobCard>(
            r#"
            INSERT INTO job_cards (order_id, title, description, assigned_to, status, due_date)
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
        .bind(data.title)
        .bind(data.description)
        .bind(data.assigned_to)
        .bind(data.status.as_str())
        .bind(data.due_date)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(job_card)
    }

    pub async fn list_owned_by(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let job_cards = sqlx::query_as::<_, JobCard>(
            r#"
            SELECT j.* FROM job_cards j
            JOIN orders o ON o.id = j.order_id
            JOIN customers c ON c.id = o.customer_id
            WHERE c.user_id = $1
            ORDER BY j.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(job_cards)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdateJobCard,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE job_cards SET updated_at = NOW()");

        if let Some(title) = data.title {
            query.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            query.push(", description = ").push_bind(description);
        }
        if let Some(assigned_to) = data.assigned_to {
            query.push(", assigned_to = ").push_bind(assigned_to);
        }
        if let Some(status) = data.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(due_date) = data.due_date {
            query.push(", due_date = ").push_bind(due_date);
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

        let job_card = query.build_query_as::<JobCard>().fetch_optional(pool).await?;

        Ok(job_card)
    }

    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM job_cards
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
            DELETE FROM job_cards
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
