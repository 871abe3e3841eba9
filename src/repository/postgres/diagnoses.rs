use async_trait::async_trait;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::diagnosis::{CropSeverityCounts, Diagnosis};
use crate::models::PageRequest;
use crate::repository::{DiagnosisRepository, NewDiagnosis, RepoResult};

#[derive(Clone)]
pub struct PgDiagnosisRepository {
    pool: PgPool,
}

impl PgDiagnosisRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiagnosisRepository for PgDiagnosisRepository {
    async fn insert(&self, diagnosis: NewDiagnosis) -> RepoResult<Diagnosis> {
        Ok(sqlx::query_as::<_, Diagnosis>(
            r#"
            INSERT INTO diagnoses (
                id, user_id, image_url, crop_type, prediction, recommendations,
                severity, status, location, notes, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(diagnosis.user_id)
        .bind(&diagnosis.image_url)
        .bind(&diagnosis.crop_type)
        .bind(diagnosis.prediction.as_ref().map(Json))
        .bind(Json(&diagnosis.recommendations))
        .bind(diagnosis.severity)
        .bind(diagnosis.status)
        .bind(diagnosis.location.as_ref().map(Json))
        .bind(&diagnosis.notes)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Diagnosis>> {
        Ok(
            sqlx::query_as::<_, Diagnosis>("SELECT * FROM diagnoses WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> RepoResult<(Vec<Diagnosis>, i64)> {
        let rows = sqlx::query_as::<_, Diagnosis>(
            "SELECT * FROM diagnoses WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM diagnoses WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((rows, total))
    }

    async fn recent_for_user(&self, user_id: Uuid, limit: i64) -> RepoResult<Vec<Diagnosis>> {
        Ok(sqlx::query_as::<_, Diagnosis>(
            "SELECT * FROM diagnoses WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_for_user_since(&self, user_id: Uuid, since: DateTime<Utc>) -> RepoResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM diagnoses WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn severity_by_crop(&self, user_id: Uuid) -> RepoResult<Vec<CropSeverityCounts>> {
        Ok(sqlx::query_as::<_, CropSeverityCounts>(
            r#"
            SELECT crop_type,
                   COUNT(*) FILTER (WHERE severity = 'critical') AS critical,
                   COUNT(*) FILTER (WHERE severity = 'high') AS high,
                   COUNT(*) FILTER (WHERE severity = 'medium') AS medium,
                   COUNT(*) FILTER (WHERE severity = 'low') AS low,
                   MAX(created_at) AS last_diagnosis
            FROM diagnoses
            WHERE user_id = $1
            GROUP BY crop_type
            ORDER BY last_diagnosis DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count(&self) -> RepoResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM diagnoses")
            .fetch_one(&self.pool)
            .await?)
    }
}
