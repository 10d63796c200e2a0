//! Postgres-backed credential store.
//!
//! ## Queries
//!
//! Authentication reads exactly two queries:
//!
//! - `select username, password, enabled from ba_user where username = $1`
//! - `select role from authority where username = $1`
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) on `ba_user` | `23505` | `UsernameTaken` |
//! | Database (unique violation) on `organization` | `23505` | `OrganizationExists` |
//! | Database (foreign key violation) | `23503` | `UnknownOrganization` |
//! | Anything else | Any | `Backend` |

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use turnstile_auth::{
    CredentialStore, NewOrganization, NewUser, Role, StoreError, UserCredentials, UserManager,
};
use turnstile_core::{OrganizationId, UserId};

#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e, Conflict::None))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self), err)]
    async fn find_user(&self, username: &str) -> Result<Option<UserCredentials>, StoreError> {
        let row: Option<(String, String, bool)> =
            sqlx::query_as("select username, password, enabled from ba_user where username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_user", e, Conflict::None))?;

        Ok(row.map(|(username, password_hash, enabled)| UserCredentials {
            username,
            password_hash,
            enabled,
        }))
    }

    #[instrument(skip(self), err)]
    async fn find_roles(&self, username: &str) -> Result<Vec<Role>, StoreError> {
        let roles: Vec<String> = sqlx::query_scalar::<_, String>("select role from authority where username = $1")
            .bind(username)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_roles", e, Conflict::None))?;

        Ok(roles.into_iter().map(Role::new).collect())
    }
}

#[async_trait]
impl UserManager for PostgresCredentialStore {
    #[instrument(skip(self), err)]
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("select exists(select 1 from ba_user where username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("username_exists", e, Conflict::None))
    }

    #[instrument(skip(self, organization), fields(name = %organization.name), err)]
    async fn create_organization(&self, organization: NewOrganization) -> Result<OrganizationId, StoreError> {
        let id = OrganizationId::new();
        sqlx::query("insert into organization (id, name, description, email) values ($1, $2, $3, $4)")
            .bind(Uuid::from(id))
            .bind(&organization.name)
            .bind(&organization.description)
            .bind(&organization.email)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_organization", e, Conflict::Organization(&organization.name)))?;
        Ok(id)
    }

    #[instrument(skip(self), err)]
    async fn find_organization(&self, name: &str) -> Result<Option<OrganizationId>, StoreError> {
        let id: Option<Uuid> = sqlx::query_scalar("select id from organization where name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_organization", e, Conflict::None))?;
        Ok(id.map(OrganizationId::from))
    }

    #[instrument(skip(self, user), fields(username = %user.username), err)]
    async fn insert_user(&self, user: NewUser) -> Result<UserId, StoreError> {
        let id = UserId::new();
        let conflict = || Conflict::User(&user.username, user.organization_id);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_user", e, Conflict::None))?;

        sqlx::query(
            "insert into ba_user (id, organization_id, username, password, first_name, last_name, email_address, enabled) \
             values ($1, $2, $3, $4, $5, $6, $7, true)",
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(user.organization_id))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e, conflict()))?;

        sqlx::query("insert into authority (username, role) values ($1, $2)")
            .bind(&user.username)
            .bind(user.role.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_user", e, conflict()))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_user", e, conflict()))?;
        Ok(id)
    }
}

/// Which uniqueness/reference violation an operation can meaningfully hit.
#[derive(Clone, Copy)]
enum Conflict<'a> {
    None,
    Organization(&'a str),
    User(&'a str, OrganizationId),
}

fn map_sqlx_error(operation: &str, err: sqlx::Error, conflict: Conflict<'_>) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code();
        match (code.as_deref(), conflict) {
            (Some("23505"), Conflict::User(username, _)) => {
                return StoreError::UsernameTaken(username.to_string());
            }
            (Some("23505"), Conflict::Organization(name)) => {
                return StoreError::OrganizationExists(name.to_string());
            }
            (Some("23503"), Conflict::User(_, organization_id)) => {
                return StoreError::UnknownOrganization(organization_id);
            }
            _ => {}
        }
    }
    StoreError::Backend(format!("{operation}: {err}"))
}
