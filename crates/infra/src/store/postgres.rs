//! Postgres-backed identity stores.
//!
//! One pool serves all four store traits. Unique violations (`23505`) surface as
//! [`StoreError::Conflict`] so provisioning can re-fetch the winner's row; every
//! other sqlx error is [`StoreError::Unavailable`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use campus_auth::Role;
use campus_core::{StudentId, UserId};

use super::{
    NewUser, Profile, ProfileStore, StoreError, StudentRecord, StudentStore, Tenant, TenantStore,
    User, UserStore,
};

const SCHEMA: &str = include_str!("../../migrations/0001_identity.sql");

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the identity tables if they do not exist yet.
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::Conflict(format!("{operation}: {err}"));
    }
    match err {
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|c| c.as_ref() == "23505"),
        _ => false,
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let raw_id: i64 = row.try_get("id")?;
    let role: String = row.try_get("role")?;
    Ok(User {
        id: UserId::new(raw_id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        external_identity_id: row.try_get("external_identity_id")?,
        display_name: row.try_get("display_name")?,
        email: row.try_get("email")?,
        role: Role::parse_or_default(&role),
        is_active: row.try_get("is_active")?,
    })
}

fn profile_from_row(row: &PgRow) -> Result<Profile, sqlx::Error> {
    let raw_id: i64 = row.try_get("user_id")?;
    let Json(preferences): Json<BTreeMap<String, serde_json::Value>> =
        row.try_get("preferences")?;
    let Json(social_links): Json<BTreeMap<String, serde_json::Value>> =
        row.try_get("social_links")?;
    Ok(Profile {
        user_id: UserId::new(raw_id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        tenant_id: row.try_get("college_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        preferences,
        social_links,
    })
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant, sqlx::Error> {
    Ok(Tenant {
        id: row.try_get("id")?,
        external_ref: row.try_get("external_ref")?,
        name: row.try_get("name")?,
    })
}

fn student_from_row(row: &PgRow) -> Result<StudentRecord, sqlx::Error> {
    let raw_id: i64 = row.try_get("id")?;
    Ok(StudentRecord {
        id: StudentId::new(raw_id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        external_identity_id: row.try_get("external_identity_id")?,
        roll_number: row.try_get("roll_number")?,
        is_active: row.try_get("is_active")?,
    })
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, external_identity_id, display_name, email, role, is_active
            FROM users
            WHERE external_identity_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("users.get_by_external_id", e))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("users.get_by_external_id", e))
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (external_identity_id, display_name, email, role, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, external_identity_id, display_name, email, role, is_active
            "#,
        )
        .bind(&user.external_identity_id)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("users.create", e))?;

        user_from_row(&row).map_err(|e| map_sqlx_error("users.create", e))
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET display_name = $2, email = $3, role = $4, is_active = $5, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user.id.get())
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("users.update", e))?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for PostgresStore {
    async fn get_by_user_id(&self, user_id: UserId) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, college_id, first_name, last_name, preferences, social_links
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("profiles.get_by_user_id", e))?;

        row.as_ref()
            .map(profile_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("profiles.get_by_user_id", e))
    }

    async fn create(&self, profile: Profile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, college_id, first_name, last_name, preferences, social_links)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(profile.user_id.get())
        .bind(profile.tenant_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(Json(&profile.preferences))
        .bind(Json(&profile.social_links))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("profiles.create", e))?;
        Ok(())
    }
}

#[async_trait]
impl TenantStore for PostgresStore {
    async fn get_by_external_ref(&self, external_ref: &str) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query("SELECT id, external_ref, name FROM colleges WHERE external_ref = $1")
            .bind(external_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("colleges.get_by_external_ref", e))?;

        row.as_ref()
            .map(tenant_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("colleges.get_by_external_ref", e))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query("SELECT id, external_ref, name FROM colleges WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("colleges.get_by_id", e))?;

        row.as_ref()
            .map(tenant_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("colleges.get_by_id", e))
    }
}

#[async_trait]
impl StudentStore for PostgresStore {
    async fn get_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<StudentRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, external_identity_id, roll_number, is_active
            FROM students
            WHERE external_identity_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("students.get_by_external_id", e))?;

        row.as_ref()
            .map(student_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("students.get_by_external_id", e))
    }
}
