//! Storage collaborator seams.
//!
//! Handlers only see these traits; `AppState` carries the concrete backend
//! chosen at startup (Postgres in `db_storage`, or the in-memory maps below).

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::filters::{apply_query, LeadQuery};
use crate::models::{IcpCategory, IcpData, IcpDataQueryParams, IcpDataView, Lead};
use crate::validation::{
    apply_category_patch, apply_icp_data_patch, apply_lead_patch, IcpDataDraft,
};

/// Document collection of leads.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Inserts a validated lead. Identifier and timestamps are assigned here;
    /// whatever the caller put in those fields is ignored.
    async fn create(&self, lead: Lead) -> Result<Lead, AppError>;
    async fn get(&self, id: Uuid) -> Result<Lead, AppError>;
    /// Applies a merge patch; the stored record is untouched when the
    /// patched document fails validation or collides on email.
    async fn update(&self, id: Uuid, patch: &Value) -> Result<Lead, AppError>;
    async fn delete(&self, id: Uuid) -> Result<Lead, AppError>;
    /// Filtered, newest-first, paginated listing.
    async fn find(&self, query: &LeadQuery) -> Result<Vec<Lead>, AppError>;
}

/// Filter for ICP data listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IcpDataFilter {
    pub category: Option<Uuid>,
    /// Case-insensitive substring of attribute or value.
    pub search: Option<String>,
}

impl IcpDataFilter {
    pub fn matches(&self, data: &IcpData) -> bool {
        if self.category.is_some_and(|category| data.icp_category != category) {
            return false;
        }
        match &self.search {
            Some(needle) => {
                let needle = needle.to_lowercase();
                data.attribute.to_lowercase().contains(&needle)
                    || data.value.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

impl TryFrom<&IcpDataQueryParams> for IcpDataFilter {
    type Error = AppError;

    fn try_from(params: &IcpDataQueryParams) -> Result<Self, Self::Error> {
        let category = params
            .category
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(|raw| crate::models::parse_id(raw, "category"))
            .transpose()?;
        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(str::to_string);
        Ok(Self { category, search })
    }
}

/// ICP reference data.
#[async_trait]
pub trait IcpRepository: Send + Sync {
    /// All categories sorted by title.
    async fn list_categories(&self) -> Result<Vec<IcpCategory>, AppError>;
    async fn get_category(&self, id: Uuid) -> Result<IcpCategory, AppError>;
    async fn find_category_by_title(&self, title: &str) -> Result<Option<IcpCategory>, AppError>;
    async fn create_category(
        &self,
        title: String,
        definition: Option<String>,
    ) -> Result<IcpCategory, AppError>;
    async fn update_category(&self, id: Uuid, patch: &Value) -> Result<IcpCategory, AppError>;
    /// Dependent data rows are left in place.
    async fn delete_category(&self, id: Uuid) -> Result<IcpCategory, AppError>;

    /// Rows sorted by attribute, categories resolved.
    async fn list_data(&self, filter: &IcpDataFilter) -> Result<Vec<IcpDataView>, AppError>;
    async fn get_data(&self, id: Uuid) -> Result<IcpDataView, AppError>;
    /// Fails with a validation error, before writing, when the category does
    /// not exist.
    async fn create_data(&self, draft: IcpDataDraft) -> Result<IcpData, AppError>;
    async fn update_data(&self, id: Uuid, patch: &Value) -> Result<IcpData, AppError>;
    async fn delete_data(&self, id: Uuid) -> Result<IcpData, AppError>;
}

pub(crate) fn lead_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Lead {} not found", id))
}

pub(crate) fn category_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("ICP category {} not found", id))
}

pub(crate) fn data_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("ICP data {} not found", id))
}

pub(crate) fn duplicate_email(email: &str) -> AppError {
    AppError::Conflict(format!("Lead with email {} already exists", email))
}

pub(crate) fn duplicate_title(title: &str) -> AppError {
    AppError::Conflict(format!("ICP category '{}' already exists", title))
}

pub(crate) fn missing_category(id: Uuid) -> AppError {
    AppError::invalid(format!("Category not found: {}", id))
}

// ============ In-memory backend ============

/// Process-local storage used for tests and `STORAGE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryStorage {
    leads: RwLock<HashMap<Uuid, Lead>>,
    categories: RwLock<HashMap<Uuid, IcpCategory>>,
    data: RwLock<HashMap<Uuid, IcpData>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a lead as-is, keeping its id and timestamps. Used to load
    /// fixtures with historical creation dates.
    pub async fn insert_raw(&self, lead: Lead) {
        self.leads.write().await.insert(lead.id, lead);
    }
}

fn email_taken(leads: &HashMap<Uuid, Lead>, email: &str, except: Option<Uuid>) -> bool {
    leads
        .values()
        .any(|lead| Some(lead.id) != except && lead.lead_info.lead_email == email)
}

#[async_trait]
impl LeadRepository for MemoryStorage {
    async fn create(&self, mut lead: Lead) -> Result<Lead, AppError> {
        let mut leads = self.leads.write().await;
        if email_taken(&leads, &lead.lead_info.lead_email, None) {
            return Err(duplicate_email(&lead.lead_info.lead_email));
        }
        let now = Utc::now();
        lead.id = Uuid::new_v4();
        lead.created_at = Some(now);
        lead.updated_at = Some(now);
        leads.insert(lead.id, lead.clone());
        Ok(lead)
    }

    async fn get(&self, id: Uuid) -> Result<Lead, AppError> {
        self.leads
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| lead_not_found(id))
    }

    async fn update(&self, id: Uuid, patch: &Value) -> Result<Lead, AppError> {
        let mut leads = self.leads.write().await;
        let current = leads.get(&id).ok_or_else(|| lead_not_found(id))?;
        let mut updated = apply_lead_patch(current, patch)?;
        if email_taken(&leads, &updated.lead_info.lead_email, Some(id)) {
            return Err(duplicate_email(&updated.lead_info.lead_email));
        }
        updated.updated_at = Some(Utc::now());
        leads.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<Lead, AppError> {
        self.leads
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| lead_not_found(id))
    }

    async fn find(&self, query: &LeadQuery) -> Result<Vec<Lead>, AppError> {
        let leads = self.leads.read().await;
        Ok(apply_query(leads.values().cloned(), query))
    }
}

#[async_trait]
impl IcpRepository for MemoryStorage {
    async fn list_categories(&self) -> Result<Vec<IcpCategory>, AppError> {
        let mut categories: Vec<IcpCategory> =
            self.categories.read().await.values().cloned().collect();
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> Result<IcpCategory, AppError> {
        self.categories
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| category_not_found(id))
    }

    async fn find_category_by_title(&self, title: &str) -> Result<Option<IcpCategory>, AppError> {
        Ok(self
            .categories
            .read()
            .await
            .values()
            .find(|category| category.title == title)
            .cloned())
    }

    async fn create_category(
        &self,
        title: String,
        definition: Option<String>,
    ) -> Result<IcpCategory, AppError> {
        let mut categories = self.categories.write().await;
        if categories.values().any(|category| category.title == title) {
            return Err(duplicate_title(&title));
        }
        let now = Utc::now();
        let category = IcpCategory {
            id: Uuid::new_v4(),
            title,
            definition,
            created_at: now,
            updated_at: now,
        };
        categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, patch: &Value) -> Result<IcpCategory, AppError> {
        let mut categories = self.categories.write().await;
        let current = categories.get(&id).ok_or_else(|| category_not_found(id))?;
        let mut updated = apply_category_patch(current, patch)?;
        if categories
            .values()
            .any(|category| category.id != id && category.title == updated.title)
        {
            return Err(duplicate_title(&updated.title));
        }
        updated.updated_at = Utc::now();
        categories.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_category(&self, id: Uuid) -> Result<IcpCategory, AppError> {
        self.categories
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| category_not_found(id))
    }

    async fn list_data(&self, filter: &IcpDataFilter) -> Result<Vec<IcpDataView>, AppError> {
        let categories = self.categories.read().await;
        let mut rows: Vec<IcpDataView> = self
            .data
            .read()
            .await
            .values()
            .filter(|data| filter.matches(data))
            .map(|data| IcpDataView::new(data.clone(), categories.get(&data.icp_category).cloned()))
            .collect();
        rows.sort_by(|a, b| a.attribute.cmp(&b.attribute));
        Ok(rows)
    }

    async fn get_data(&self, id: Uuid) -> Result<IcpDataView, AppError> {
        let data = self
            .data
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| data_not_found(id))?;
        let category = self.categories.read().await.get(&data.icp_category).cloned();
        Ok(IcpDataView::new(data, category))
    }

    async fn create_data(&self, draft: IcpDataDraft) -> Result<IcpData, AppError> {
        if !self.categories.read().await.contains_key(&draft.icp_category) {
            return Err(missing_category(draft.icp_category));
        }
        let now = Utc::now();
        let data = IcpData {
            id: Uuid::new_v4(),
            icp_category: draft.icp_category,
            attribute: draft.attribute,
            value: draft.value,
            description: draft.description,
            created_at: now,
            updated_at: now,
        };
        self.data.write().await.insert(data.id, data.clone());
        Ok(data)
    }

    async fn update_data(&self, id: Uuid, patch: &Value) -> Result<IcpData, AppError> {
        let mut rows = self.data.write().await;
        let current = rows.get(&id).ok_or_else(|| data_not_found(id))?;
        let mut updated = apply_icp_data_patch(current, patch)?;
        updated.updated_at = Utc::now();
        rows.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_data(&self, id: Uuid) -> Result<IcpData, AppError> {
        self.data
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| data_not_found(id))
    }
}
