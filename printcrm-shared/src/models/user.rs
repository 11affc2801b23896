/// User model and database operations
///
/// A user is the root of everything the shop owns: customers hang off
/// `users.id` and every other business row hangs off a customer.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,  -- unique on LOWER(email)
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255),
///     metadata JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use printcrm_shared::models::user::{User, CreateUser};
/// use printcrm_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "owner@signshop.example".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Asha".to_string()),
///     metadata: serde_json::json!({ "shop_name": "Asha Signs" }),
/// }).await?;
///
/// let found = User::find_by_email(&pool, "OWNER@signshop.example").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// Password hash stored for accounts that can never log in with a password
/// (not a valid PHC string, so verification always fails)
pub const UNUSABLE_PASSWORD_HASH: &str = "!";

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Email address (unique ignoring case)
    pub email: String,

    /// Argon2id password hash, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub name: Option<String>,

    /// Free-form profile data (shop name, phone, preferences)
    pub metadata: JsonValue,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// None until the first successful login
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,

    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,

    pub name: Option<String>,

    pub metadata: JsonValue,
}

/// Input for updating an existing user
///
/// Only `Some` fields are written. `name: Some(None)` clears the name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<Option<String>>,

    /// Replaces the whole metadata object
    pub metadata: Option<JsonValue>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_hash.is_none()
            && self.name.is_none()
            && self.metadata.is_none()
    }
}

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation if the email is already registered.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name, metadata)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, name, metadata,
                      created_at, updated_at, last_login_at
            "#,
        )
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.name)
        .bind(data.metadata)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Inserts a password-less user with a fixed id unless it already exists
    ///
    /// Used to give a configured fixed identity a real row, so its customers
    /// satisfy the `customers.user_id` foreign key.
    pub async fn ensure_exists(pool: &PgPool, id: Uuid, email: &str) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(UNUSABLE_PASSWORD_HASH)
        .execute(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, metadata,
                   created_at, updated_at, last_login_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, metadata,
                   created_at, updated_at, last_login_at
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Updates an existing user
    ///
    /// Only `Some` fields in `data` are written; `updated_at` is always
    /// refreshed. Returns None if the user does not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            query.push_str(&format!(", password_hash = ${}", bind_count));
        }
        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.metadata.is_some() {
            bind_count += 1;
            query.push_str(&format!(", metadata = ${}", bind_count));
        }

        query.push_str(
            " WHERE id = $1 RETURNING id, email, password_hash, name, metadata, \
             created_at, updated_at, last_login_at",
        );

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }
        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(metadata) = data.metadata {
            q = q.bind(metadata);
        }

        let user = q.fetch_optional(pool).await?;

        Ok(user)
    }

    /// Deletes a user by ID
    ///
    /// Sessions go with the user (`ON DELETE CASCADE`). Customers do not:
    /// while any customer still references the user this fails with a
    /// foreign key violation, so business data must be removed first.
    ///
    /// Returns true if a row was deleted.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a successful login
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
