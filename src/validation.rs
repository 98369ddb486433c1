//! Boundary validation for lead and ICP writes.
//!
//! Every write path funnels through here so the storage backends only ever
//! see records that satisfy the score ranges, required fields and email
//! format. Partial updates are applied as JSON merge patches and then
//! validated exactly like a fresh record.

use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{IcpCategory, IcpData, Lead, NewIcpCategory, NewIcpData};

/// Top-level fields a lead create request must carry.
pub const REQUIRED_LEAD_FIELDS: [&str; 9] = [
    "budgetScore",
    "authorityScore",
    "needScore",
    "timelineScore",
    "finalStatus",
    "status",
    "leadScore",
    "isQualified",
    "leadInfo",
];

/// Fields owned by storage; patches touching them are ignored.
const STORAGE_OWNED_FIELDS: [&str; 3] = ["_id", "createdAt", "updatedAt"];

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

// RFC 5322 simplified email regex
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("email regex compiles")
});

/// Validate email address format (local@domain.tld).
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') {
        return false;
    }
    if !EMAIL_REGEX.is_match(email) {
        tracing::warn!("Invalid email format: {}", email);
        return false;
    }
    true
}

/// Builds a lead from a create request body.
///
/// The returned lead carries a nil id and no timestamps; the repository
/// assigns those on insert.
pub fn prepare_new_lead(body: Value) -> Result<Lead, AppError> {
    let Value::Object(mut fields) = body else {
        return Err(AppError::invalid("Request body must be a JSON object"));
    };

    let missing: Vec<String> = REQUIRED_LEAD_FIELDS
        .iter()
        .filter(|field| !fields.contains_key(**field))
        .map(|field| format!("Missing required field: {}", field))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation(missing));
    }
    require_boolean_flag(&fields)?;

    for field in STORAGE_OWNED_FIELDS {
        fields.remove(field);
    }
    fields.insert("_id".to_string(), Value::String(Uuid::nil().to_string()));
    normalize_email_field(&mut fields);

    let lead: Lead = serde_json::from_value(Value::Object(fields))?;
    validate_lead(&lead)?;
    Ok(lead)
}

/// Checks the invariants every stored lead must satisfy.
pub fn validate_lead(lead: &Lead) -> Result<(), AppError> {
    let mut errors = Vec::new();

    let scores = [
        ("budgetScore", lead.budget_score),
        ("authorityScore", lead.authority_score),
        ("needScore", lead.need_score),
        ("timelineScore", lead.timeline_score),
        ("leadScore", lead.lead_score),
    ];
    for (field, score) in scores {
        if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            errors.push(format!(
                "{} must be between {} and {} (got {})",
                field, MIN_SCORE, MAX_SCORE, score
            ));
        }
    }

    let info = &lead.lead_info;
    if info.lead_name.trim().is_empty() {
        errors.push("leadInfo.leadName is required".to_string());
    }
    if info.company_name.trim().is_empty() {
        errors.push("leadInfo.companyName is required".to_string());
    }
    if info.lead_email.trim().is_empty() {
        errors.push("leadInfo.leadEmail is required".to_string());
    } else if !is_valid_email(&info.lead_email) {
        errors.push(format!(
            "leadInfo.leadEmail is not a valid email address: {}",
            info.lead_email
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Applies a merge patch to a lead and re-validates the result.
pub fn apply_lead_patch(lead: &Lead, patch: &Value) -> Result<Lead, AppError> {
    if let Value::Object(fields) = patch {
        if fields.contains_key("isQualified") {
            require_boolean_flag(fields)?;
        }
    }
    let mut merged = patched_document(lead, patch)?;
    if let Value::Object(fields) = &mut merged {
        normalize_email_field(fields);
    }
    let updated: Lead = serde_json::from_value(merged)?;
    validate_lead(&updated)?;
    Ok(updated)
}

/// Merges `patch` into `target` (RFC 7386 semantics).
///
/// Objects merge key by key, `null` removes the key, anything else replaces.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_fields) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_fields) = target {
        for (key, value) in patch_fields {
            if value.is_null() {
                target_fields.remove(key);
            } else {
                merge_patch(
                    target_fields.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

/// Validates a category create payload into `(title, definition)`.
pub fn validate_new_category(input: NewIcpCategory) -> Result<(String, Option<String>), AppError> {
    let title = required_text(input.title, "title")?;
    Ok((title, non_blank(input.definition)))
}

/// Validated create payload for an ICP data row.
#[derive(Debug, Clone)]
pub struct IcpDataDraft {
    pub icp_category: Uuid,
    pub attribute: String,
    pub value: String,
    pub description: Option<String>,
}

/// Validates an ICP data create payload. Category existence is checked by
/// the repository.
pub fn validate_new_icp_data(input: NewIcpData) -> Result<IcpDataDraft, AppError> {
    let mut errors = Vec::new();
    let category = match input.icp_category.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push("Missing fields: icp_category".to_string());
            None
        }
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push(format!("icp_category is not a valid ID: {}", raw));
                None
            }
        },
    };
    let attribute = non_blank(input.attribute);
    if attribute.is_none() {
        errors.push("Missing fields: attribute".to_string());
    }
    let value = non_blank(input.value);
    if value.is_none() {
        errors.push("Missing fields: value".to_string());
    }

    match (category, attribute, value) {
        (Some(icp_category), Some(attribute), Some(value)) if errors.is_empty() => {
            Ok(IcpDataDraft {
                icp_category,
                attribute,
                value,
                description: non_blank(input.description),
            })
        }
        _ => Err(AppError::Validation(errors)),
    }
}

pub fn apply_category_patch(category: &IcpCategory, patch: &Value) -> Result<IcpCategory, AppError> {
    let updated: IcpCategory = serde_json::from_value(patched_document(category, patch)?)?;
    if updated.title.trim().is_empty() {
        return Err(AppError::invalid("title is required"));
    }
    Ok(updated)
}

pub fn apply_icp_data_patch(data: &IcpData, patch: &Value) -> Result<IcpData, AppError> {
    let updated: IcpData = serde_json::from_value(patched_document(data, patch)?)?;
    let mut errors = Vec::new();
    if updated.attribute.trim().is_empty() {
        errors.push("attribute is required".to_string());
    }
    if updated.value.trim().is_empty() {
        errors.push("value is required".to_string());
    }
    if errors.is_empty() {
        Ok(updated)
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Serializes `record`, merges the patch minus storage-owned fields.
fn patched_document<T: Serialize + DeserializeOwned>(
    record: &T,
    patch: &Value,
) -> Result<Value, AppError> {
    let Value::Object(patch_fields) = patch else {
        return Err(AppError::invalid("Patch body must be a JSON object"));
    };
    let mut patch = patch_fields.clone();
    for field in STORAGE_OWNED_FIELDS {
        patch.remove(field);
    }
    let mut document = serde_json::to_value(record)?;
    merge_patch(&mut document, &Value::Object(patch));
    Ok(document)
}

/// `isQualified` may be omitted from a patch but never cleared or set to a
/// non-boolean.
fn require_boolean_flag(fields: &Map<String, Value>) -> Result<(), AppError> {
    match fields.get("isQualified") {
        Some(Value::Bool(_)) => Ok(()),
        Some(other) => Err(AppError::invalid(format!(
            "isQualified must be true or false (got {})",
            other
        ))),
        None => Err(AppError::invalid("Missing required field: isQualified")),
    }
}

fn normalize_email_field(fields: &mut Map<String, Value>) {
    if let Some(Value::Object(info)) = fields.get_mut("leadInfo") {
        if let Some(Value::String(email)) = info.get_mut("leadEmail") {
            *email = email.trim().to_lowercase();
        }
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    non_blank(value).ok_or_else(|| AppError::invalid(format!("Missing {}", field)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
