use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::AppError;

// ============ Lead Models ============

/// Qualification status stored on every lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LeadStatus {
    #[serde(rename = "Qualified")]
    Qualified,
    #[serde(rename = "Disqualified")]
    Disqualified,
    #[serde(rename = "Low Priority Lead")]
    LowPriority,
    #[default]
    #[serde(rename = "pending")]
    Pending,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 4] = [
        LeadStatus::Qualified,
        LeadStatus::Disqualified,
        LeadStatus::LowPriority,
        LeadStatus::Pending,
    ];

    /// Wire literal, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Qualified => "Qualified",
            LeadStatus::Disqualified => "Disqualified",
            LeadStatus::LowPriority => "Low Priority Lead",
            LeadStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeadStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                AppError::invalid(format!(
                    "status must be one of Qualified, Disqualified, Low Priority Lead, pending (got '{}')",
                    s
                ))
            })
    }
}

/// Canonical outcome of a lead, reconciling `isQualified` and `status`.
///
/// Derivation order:
/// 1. `Low Priority Lead` status is always `LowPriority`.
/// 2. `pending` status is always `Pending`, whatever the boolean says.
/// 3. Otherwise `isQualified` decides when it is present.
/// 4. Otherwise the status itself (`Qualified` / `Disqualified`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LeadOutcome {
    Qualified,
    Disqualified,
    LowPriority,
    Pending,
}

impl LeadOutcome {
    pub fn derive(is_qualified: Option<bool>, status: LeadStatus) -> Self {
        match (status, is_qualified) {
            (LeadStatus::LowPriority, _) => LeadOutcome::LowPriority,
            (LeadStatus::Pending, _) => LeadOutcome::Pending,
            (_, Some(true)) => LeadOutcome::Qualified,
            (_, Some(false)) => LeadOutcome::Disqualified,
            (LeadStatus::Qualified, None) => LeadOutcome::Qualified,
            (LeadStatus::Disqualified, None) => LeadOutcome::Disqualified,
        }
    }
}

/// Company revenue as captured by the intake form: free text or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Revenue {
    Amount(f64),
    Text(String),
}

/// Qualitative notes gathered during discovery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadData {
    #[serde(default)]
    pub success_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_need: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_solution: Option<String>,
}

/// Contact and company profile embedded in each lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadInfo {
    pub lead_name: String,
    /// Unique across all leads, stored lowercase.
    pub lead_email: String,
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_team_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<Revenue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_budget: Option<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(
        rename = "opportunity_type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub opportunity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_data: Option<LeadData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_name: Option<String>,
}

/// A sales lead scored on the BANT dimensions.
///
/// Serialized with the camelCase field names used by the dashboard,
/// with the storage identifier exposed as `_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Storage-assigned identifier.
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub budget_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_evidence: Option<String>,
    pub authority_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_evidence: Option<String>,
    pub need_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub need_evidence: Option<String>,
    pub timeline_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline_evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_assessment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualification_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dis_qualification_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_action: Option<String>,
    #[serde(default)]
    pub final_status: String,
    #[serde(default)]
    pub status: LeadStatus,
    /// Overall qualification strength in [0, 10], computed upstream.
    pub lead_score: f64,
    /// `None` only for records written without the flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_qualified: Option<bool>,
    pub lead_info: LeadInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Lead {
    pub fn outcome(&self) -> LeadOutcome {
        LeadOutcome::derive(self.is_qualified, self.status)
    }

    /// Industry bucket used by analytics; blank industries are "Unknown".
    pub fn industry(&self) -> &str {
        match self.lead_info.lead_industry.as_deref() {
            Some(industry) if !industry.is_empty() => industry,
            _ => "Unknown",
        }
    }
}

// ============ ICP Models ============

/// A category in the Ideal Customer Profile taxonomy.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcpCategory {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Unique across categories.
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One attribute/value row belonging to an ICP category.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcpData {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "icp_category")]
    pub icp_category: Uuid,
    pub attribute: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category reference of an ICP row after lookup.
///
/// `Unresolved` keeps the raw id when the category was deleted after the
/// row was created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Resolved(IcpCategory),
    Unresolved(Uuid),
}

impl CategoryRef {
    pub fn title(&self) -> &str {
        match self {
            CategoryRef::Resolved(category) => &category.title,
            CategoryRef::Unresolved(_) => "Unknown",
        }
    }

    pub fn definition(&self) -> &str {
        match self {
            CategoryRef::Resolved(category) => category.definition.as_deref().unwrap_or(""),
            CategoryRef::Unresolved(_) => "",
        }
    }
}

/// ICP row with its category joined in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IcpDataView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "icp_category")]
    pub icp_category: CategoryRef,
    pub attribute: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IcpDataView {
    pub fn new(data: IcpData, category: Option<IcpCategory>) -> Self {
        let icp_category = match category {
            Some(category) => CategoryRef::Resolved(category),
            None => CategoryRef::Unresolved(data.icp_category),
        };
        Self {
            id: data.id,
            icp_category,
            attribute: data.attribute,
            value: data.value,
            description: data.description,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }
}

/// Flattened ICP row for exports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedIcp {
    pub icp_category: String,
    pub attribute: String,
    pub value: String,
    pub description: String,
    pub definition: String,
}

impl From<&IcpDataView> for ExportedIcp {
    fn from(view: &IcpDataView) -> Self {
        Self {
            icp_category: view.icp_category.title().to_string(),
            attribute: view.attribute.clone(),
            value: view.value.clone(),
            description: view.description.clone().unwrap_or_default(),
            definition: view.icp_category.definition().to_string(),
        }
    }
}

// ============ API Request/Response Models ============

/// Create payload for an ICP category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewIcpCategory {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
}

/// Create payload for an ICP data row.
#[derive(Debug, Clone, Deserialize)]
pub struct NewIcpData {
    #[serde(default)]
    pub icp_category: Option<String>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Query parameters of the ICP data list and export endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IcpDataQueryParams {
    pub category: Option<String>,
    pub search: Option<String>,
    pub format: Option<String>,
}

/// Generic `{ success, data }` envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// `{ success, message, data }` envelope returned by lead writes.
#[derive(Debug, Serialize)]
pub struct LeadWriteResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Lead>,
}

/// Parses a path or body identifier.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::invalid(format!("Invalid {} ID format", what)))
}
