//! Postgres backend: leads as JSONB documents, ICP data as plain rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::filters::LeadQuery;
use crate::models::{IcpCategory, IcpData, IcpDataView, Lead};
use crate::storage::{
    category_not_found, data_not_found, duplicate_email, lead_not_found, missing_category,
    IcpDataFilter, IcpRepository, LeadRepository,
};
use crate::validation::{
    apply_category_patch, apply_icp_data_patch, apply_lead_patch, IcpDataDraft,
};

const LEAD_COLUMNS: &str = "id, document, created_at, updated_at";

#[derive(Debug, FromRow)]
struct LeadRow {
    id: Uuid,
    document: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LeadRow {
    /// Columns are authoritative for identity and timestamps.
    fn into_lead(self) -> Result<Lead, AppError> {
        let mut lead: Lead = serde_json::from_value(self.document).map_err(|e| {
            AppError::InternalError(format!("Stored lead {} is malformed: {}", self.id, e))
        })?;
        lead.id = self.id;
        lead.created_at = Some(self.created_at);
        lead.updated_at = Some(self.updated_at);
        Ok(lead)
    }
}

#[derive(Debug, FromRow)]
struct IcpDataJoinRow {
    id: Uuid,
    icp_category: Uuid,
    attribute: String,
    value: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    category_title: Option<String>,
    category_definition: Option<String>,
    category_created_at: Option<DateTime<Utc>>,
    category_updated_at: Option<DateTime<Utc>>,
}

impl From<IcpDataJoinRow> for IcpDataView {
    fn from(row: IcpDataJoinRow) -> Self {
        let category = match (
            row.category_title,
            row.category_created_at,
            row.category_updated_at,
        ) {
            (Some(title), Some(created_at), Some(updated_at)) => Some(IcpCategory {
                id: row.icp_category,
                title,
                definition: row.category_definition,
                created_at,
                updated_at,
            }),
            _ => None,
        };
        IcpDataView::new(
            IcpData {
                id: row.id,
                icp_category: row.icp_category,
                attribute: row.attribute,
                value: row.value,
                description: row.description,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            category,
        )
    }
}

const ICP_JOIN_SELECT: &str = r#"
    SELECT d.id, d.icp_category, d.attribute, d.value, d.description,
           d.created_at, d.updated_at,
           c.title AS category_title,
           c.definition AS category_definition,
           c.created_at AS category_created_at,
           c.updated_at AS category_updated_at
    FROM icp_data d
    LEFT JOIN icp_categories c ON c.id = d.icp_category
"#;

/// Escapes LIKE metacharacters so user search text matches literally.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Database storage service for leads and ICP reference data.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn email_in_use(&self, email: &str, except: Option<Uuid>) -> Result<bool, AppError> {
        let (taken,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM leads WHERE lead_email = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.pool)
        .await
        .context("checking lead email uniqueness")?;
        Ok(taken)
    }

    async fn fetch_category(&self, id: Uuid) -> Result<Option<IcpCategory>, AppError> {
        sqlx::query_as::<_, IcpCategory>(
            "SELECT id, title, definition, created_at, updated_at FROM icp_categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("fetching ICP category {}", id))
    }

    async fn fetch_data(&self, id: Uuid) -> Result<IcpData, AppError> {
        sqlx::query_as::<_, IcpData>(
            "SELECT id, icp_category, attribute, value, description, created_at, updated_at FROM icp_data WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("fetching ICP data {}", id))?
        .ok_or_else(|| data_not_found(id))
    }
}

#[async_trait]
impl LeadRepository for PgStorage {
    async fn create(&self, mut lead: Lead) -> Result<Lead, AppError> {
        if self.email_in_use(&lead.lead_info.lead_email, None).await? {
            return Err(duplicate_email(&lead.lead_info.lead_email));
        }

        let now = Utc::now();
        lead.id = Uuid::new_v4();
        lead.created_at = Some(now);
        lead.updated_at = Some(now);
        let document = serde_json::to_value(&lead)?;

        let row = sqlx::query_as::<_, LeadRow>(&format!(
            r#"
            INSERT INTO leads (id, lead_email, lead_score, is_qualified, status, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
        .bind(lead.id)
        .bind(&lead.lead_info.lead_email)
        .bind(lead.lead_score)
        .bind(lead.is_qualified)
        .bind(lead.status.as_str())
        .bind(&document)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("inserting lead")?;

        tracing::info!("Stored lead {} ({})", row.id, lead.lead_info.lead_email);
        row.into_lead()
    }

    async fn get(&self, id: Uuid) -> Result<Lead, AppError> {
        sqlx::query_as::<_, LeadRow>(&format!("SELECT {} FROM leads WHERE id = $1", LEAD_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("fetching lead {}", id))?
            .ok_or_else(|| lead_not_found(id))?
            .into_lead()
    }

    async fn update(&self, id: Uuid, patch: &Value) -> Result<Lead, AppError> {
        let current = self.get(id).await?;
        let mut updated = apply_lead_patch(&current, patch)?;

        if updated.lead_info.lead_email != current.lead_info.lead_email
            && self
                .email_in_use(&updated.lead_info.lead_email, Some(id))
                .await?
        {
            return Err(duplicate_email(&updated.lead_info.lead_email));
        }

        let now = Utc::now();
        updated.updated_at = Some(now);
        let document = serde_json::to_value(&updated)?;

        let row = sqlx::query_as::<_, LeadRow>(&format!(
            r#"
            UPDATE leads
            SET lead_email = $2, lead_score = $3, is_qualified = $4, status = $5,
                document = $6, updated_at = $7
            WHERE id = $1
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
        .bind(id)
        .bind(&updated.lead_info.lead_email)
        .bind(updated.lead_score)
        .bind(updated.is_qualified)
        .bind(updated.status.as_str())
        .bind(&document)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("updating lead {}", id))?
        .ok_or_else(|| lead_not_found(id))?;

        row.into_lead()
    }

    async fn delete(&self, id: Uuid) -> Result<Lead, AppError> {
        sqlx::query_as::<_, LeadRow>(&format!(
            "DELETE FROM leads WHERE id = $1 RETURNING {}",
            LEAD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("deleting lead {}", id))?
        .ok_or_else(|| lead_not_found(id))?
        .into_lead()
    }

    async fn find(&self, query: &LeadQuery) -> Result<Vec<Lead>, AppError> {
        let filter = &query.filter;
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM leads WHERE TRUE", LEAD_COLUMNS));

        if let Some(is_qualified) = filter.is_qualified {
            builder.push(" AND is_qualified = ").push_bind(is_qualified);
        }
        if let Some(min) = filter.score_min {
            builder.push(" AND lead_score >= ").push_bind(min);
        }
        if let Some(max) = filter.score_max {
            builder.push(" AND lead_score <= ").push_bind(max);
        }
        if let Some(from) = filter.date_from {
            builder.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.date_to {
            builder.push(" AND created_at <= ").push_bind(to);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }

        // id breaks ties so pages stay stable
        builder.push(" ORDER BY created_at DESC, id");
        if let Some(page) = query.page {
            builder
                .push(" LIMIT ")
                .push_bind(to_i64(page.limit))
                .push(" OFFSET ")
                .push_bind(to_i64(page.offset));
        }

        let rows = builder
            .build_query_as::<LeadRow>()
            .fetch_all(&self.pool)
            .await
            .context("querying leads")?;

        tracing::debug!("Lead query matched {} rows", rows.len());
        rows.into_iter().map(LeadRow::into_lead).collect()
    }
}

#[async_trait]
impl IcpRepository for PgStorage {
    async fn list_categories(&self) -> Result<Vec<IcpCategory>, AppError> {
        sqlx::query_as::<_, IcpCategory>(
            "SELECT id, title, definition, created_at, updated_at FROM icp_categories ORDER BY title ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("listing ICP categories")
    }

    async fn get_category(&self, id: Uuid) -> Result<IcpCategory, AppError> {
        self.fetch_category(id)
            .await?
            .ok_or_else(|| category_not_found(id))
    }

    async fn find_category_by_title(&self, title: &str) -> Result<Option<IcpCategory>, AppError> {
        sqlx::query_as::<_, IcpCategory>(
            "SELECT id, title, definition, created_at, updated_at FROM icp_categories WHERE title = $1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .context("looking up ICP category by title")
    }

    async fn create_category(
        &self,
        title: String,
        definition: Option<String>,
    ) -> Result<IcpCategory, AppError> {
        let now = Utc::now();
        // Unique violation on title maps to Conflict via From<sqlx::Error>
        sqlx::query_as::<_, IcpCategory>(
            r#"
            INSERT INTO icp_categories (id, title, definition, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, title, definition, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&title)
        .bind(&definition)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("creating ICP category '{}'", title))
    }

    async fn update_category(&self, id: Uuid, patch: &Value) -> Result<IcpCategory, AppError> {
        let current = self.get_category(id).await?;
        let updated = apply_category_patch(&current, patch)?;

        sqlx::query_as::<_, IcpCategory>(
            r#"
            UPDATE icp_categories
            SET title = $2, definition = $3, updated_at = now()
            WHERE id = $1
            RETURNING id, title, definition, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&updated.title)
        .bind(&updated.definition)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("updating ICP category {}", id))?
        .ok_or_else(|| category_not_found(id))
    }

    async fn delete_category(&self, id: Uuid) -> Result<IcpCategory, AppError> {
        sqlx::query_as::<_, IcpCategory>(
            "DELETE FROM icp_categories WHERE id = $1 RETURNING id, title, definition, created_at, updated_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("deleting ICP category {}", id))?
        .ok_or_else(|| category_not_found(id))
    }

    async fn list_data(&self, filter: &IcpDataFilter) -> Result<Vec<IcpDataView>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(ICP_JOIN_SELECT);
        builder.push(" WHERE TRUE");
        if let Some(category) = filter.category {
            builder.push(" AND d.icp_category = ").push_bind(category);
        }
        if let Some(search) = &filter.search {
            let pattern = like_pattern(search);
            builder
                .push(" AND (d.attribute ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR d.value ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder.push(" ORDER BY d.attribute ASC");

        let rows = builder
            .build_query_as::<IcpDataJoinRow>()
            .fetch_all(&self.pool)
            .await
            .context("listing ICP data")?;
        Ok(rows.into_iter().map(IcpDataView::from).collect())
    }

    async fn get_data(&self, id: Uuid) -> Result<IcpDataView, AppError> {
        let row = sqlx::query_as::<_, IcpDataJoinRow>(&format!("{} WHERE d.id = $1", ICP_JOIN_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("fetching ICP data {}", id))?
            .ok_or_else(|| data_not_found(id))?;
        Ok(row.into())
    }

    async fn create_data(&self, draft: IcpDataDraft) -> Result<IcpData, AppError> {
        if self.fetch_category(draft.icp_category).await?.is_none() {
            return Err(missing_category(draft.icp_category));
        }

        sqlx::query_as::<_, IcpData>(
            r#"
            INSERT INTO icp_data (id, icp_category, attribute, value, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            RETURNING id, icp_category, attribute, value, description, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(draft.icp_category)
        .bind(&draft.attribute)
        .bind(&draft.value)
        .bind(&draft.description)
        .fetch_one(&self.pool)
        .await
        .context("creating ICP data")
    }

    async fn update_data(&self, id: Uuid, patch: &Value) -> Result<IcpData, AppError> {
        let current = self.fetch_data(id).await?;
        let updated = apply_icp_data_patch(&current, patch)?;

        sqlx::query_as::<_, IcpData>(
            r#"
            UPDATE icp_data
            SET icp_category = $2, attribute = $3, value = $4, description = $5, updated_at = now()
            WHERE id = $1
            RETURNING id, icp_category, attribute, value, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(updated.icp_category)
        .bind(&updated.attribute)
        .bind(&updated.value)
        .bind(&updated.description)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("updating ICP data {}", id))?
        .ok_or_else(|| data_not_found(id))
    }

    async fn delete_data(&self, id: Uuid) -> Result<IcpData, AppError> {
        sqlx::query_as::<_, IcpData>(
            "DELETE FROM icp_data WHERE id = $1 RETURNING id, icp_category, attribute, value, description, created_at, updated_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("deleting ICP data {}", id))?
        .ok_or_else(|| data_not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn row_columns_override_document_identity() {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let row = LeadRow {
            id,
            document: serde_json::json!({
                "_id": Uuid::nil(),
                "budgetScore": 1, "authorityScore": 2, "needScore": 3, "timelineScore": 4,
                "leadScore": 2.5,
                "leadInfo": { "leadName": "Lee", "leadEmail": "lee@umbrella.com", "companyName": "Umbrella" }
            }),
            created_at,
            updated_at: created_at,
        };
        let lead = row.into_lead().unwrap();
        assert_eq!(lead.id, id);
        assert_eq!(lead.created_at, Some(created_at));
        assert_eq!(lead.is_qualified, None);
    }
}
