use async_trait::async_trait;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{PageRequest, Role, User};
use crate::repository::{NewUser, RepoError, RepoResult, UserPatch, UserRepository, EMAIL_TAKEN};

const USER_COLUMNS: &str =
    "id, name, email, role, language, profile, is_verified, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// The only unique constraint on users is the email
fn email_conflict(e: sqlx::Error) -> RepoError {
    match RepoError::from(e) {
        RepoError::Duplicate(_) => RepoError::Duplicate(EMAIL_TAKEN.to_string()),
        other => other,
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> RepoResult<User> {
        let query = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, language, profile, is_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, NOW(), NOW())
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(&user.language)
            .bind(Json(&user.profile))
            .fetch_one(&self.pool)
            .await
            .map_err(email_conflict)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<(User, String)>> {
        let query = format!(
            "SELECT {}, password_hash FROM users WHERE email = $1",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, CredentialRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| (r.user, r.password_hash)))
    }

    async fn password_hash(&self, id: Uuid) -> RepoResult<String> {
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::NotFound("User"))
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> RepoResult<User> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
        let mut set = query.separated(", ");

        if let Some(name) = patch.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(email) = patch.email {
            set.push("email = ").push_bind_unseparated(email);
        }
        if let Some(role) = patch.role {
            set.push("role = ").push_bind_unseparated(role);
        }
        if let Some(language) = patch.language {
            set.push("language = ").push_bind_unseparated(language);
        }
        if let Some(profile) = patch.profile {
            set.push("profile = ").push_bind_unseparated(Json(profile));
        }
        if let Some(verified) = patch.is_verified {
            set.push("is_verified = ").push_bind_unseparated(verified);
        }
        if let Some(hash) = patch.password_hash {
            set.push("password_hash = ").push_bind_unseparated(hash);
        }
        set.push("updated_at = NOW()");

        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {}", USER_COLUMNS));

        query
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await
            .map_err(email_conflict)?
            .ok_or(RepoError::NotFound("User"))
    }

    async fn find_many(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list(&self, role: Option<Role>, page: PageRequest) -> RepoResult<(Vec<User>, i64)> {
        let mut select: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM users WHERE 1=1", USER_COLUMNS));
        if let Some(role) = role {
            select.push(" AND role = ").push_bind(role);
        }
        select.push(" ORDER BY created_at DESC LIMIT ");
        select.push_bind(i64::from(page.limit));
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let users = select
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await?;
        let total = self.count(role).await?;
        Ok((users, total))
    }

    async fn count(&self, role: Option<Role>) -> RepoResult<i64> {
        let count = match role {
            Some(role) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = $1")
                    .bind(role)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> RepoResult<i64> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE created_at >= $1")
                .bind(since)
                .fetch_one(&self.pool)
                .await?,
        )
    }
}
