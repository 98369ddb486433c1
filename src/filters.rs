//! Query-filter construction for the list, export and analytics endpoints.
//!
//! Raw query-string parameters are validated once into a typed [`LeadQuery`].
//! Every supplied constraint is ANDed; omitted ones impose nothing. The
//! Postgres backend translates the same [`LeadFilter`] into SQL, the
//! in-memory backend evaluates [`LeadFilter::matches`] directly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Lead, LeadStatus};

pub const DEFAULT_LIMIT: usize = 1000;

/// Query parameters as they arrive on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadQueryParams {
    pub is_qualified: Option<String>,
    pub score_min: Option<String>,
    pub score_max: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub status: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Conjunctive predicate over leads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadFilter {
    pub is_qualified: Option<bool>,
    pub score_min: Option<f64>,
    pub score_max: Option<f64>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub status: Option<LeadStatus>,
}

impl LeadFilter {
    pub fn matches(&self, lead: &Lead) -> bool {
        if let Some(expected) = self.is_qualified {
            if lead.is_qualified != Some(expected) {
                return false;
            }
        }
        if let Some(min) = self.score_min {
            if lead.lead_score < min {
                return false;
            }
        }
        if let Some(max) = self.score_max {
            if lead.lead_score > max {
                return false;
            }
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            // A lead without a creation instant cannot satisfy a date bound
            let Some(created_at) = lead.created_at else {
                return false;
            };
            if self.date_from.is_some_and(|from| created_at < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| created_at > to) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if lead.status != status {
                return false;
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        *self == LeadFilter::default()
    }
}

/// Offset/limit window taken after sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Validated list query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadQuery {
    pub filter: LeadFilter,
    /// `None` when the caller gave neither `limit` nor `offset`.
    pub page: Option<Page>,
}

impl LeadQuery {
    pub fn all() -> Self {
        Self::default()
    }

    /// Page used by the export endpoint, which always paginates.
    pub fn paginated(mut self) -> Self {
        self.page.get_or_insert_with(Page::default);
        self
    }

    /// Stable key for caching results of this query.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl TryFrom<LeadQueryParams> for LeadQuery {
    type Error = AppError;

    fn try_from(params: LeadQueryParams) -> Result<Self, Self::Error> {
        let mut errors = Vec::new();

        // Any literal other than "true" selects unqualified leads
        let is_qualified = params.is_qualified.map(|raw| raw == "true");

        let score_min = collect(parse_score(params.score_min, "scoreMin"), &mut errors);
        let score_max = collect(parse_score(params.score_max, "scoreMax"), &mut errors);
        let date_from = collect(parse_date(params.date_from, "dateFrom"), &mut errors);
        let date_to = collect(parse_date(params.date_to, "dateTo"), &mut errors);
        let status = collect(
            non_empty(params.status)
                .map(|raw| raw.parse::<LeadStatus>())
                .transpose(),
            &mut errors,
        );
        let limit = collect(parse_count(params.limit, "limit"), &mut errors);
        let offset = collect(parse_count(params.offset, "offset"), &mut errors);

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let page = match (limit.flatten(), offset.flatten()) {
            (None, None) => None,
            (limit, offset) => Some(Page {
                limit: limit.unwrap_or(DEFAULT_LIMIT),
                offset: offset.unwrap_or(0),
            }),
        };

        Ok(LeadQuery {
            filter: LeadFilter {
                is_qualified,
                score_min: score_min.flatten(),
                score_max: score_max.flatten(),
                date_from: date_from.flatten(),
                date_to: date_to.flatten(),
                status: status.flatten(),
            },
            page,
        })
    }
}

/// Filters, sorts newest first, then paginates.
pub fn apply_query(leads: impl IntoIterator<Item = Lead>, query: &LeadQuery) -> Vec<Lead> {
    let mut matched: Vec<Lead> = leads
        .into_iter()
        .filter(|lead| query.filter.matches(lead))
        .collect();
    // Newest first, id breaks ties; leads without a creation instant go last
    matched.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    match query.page {
        Some(page) => matched
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect(),
        None => matched,
    }
}

// ============ Client-side view filter ============

/// Query parameters of the browse endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewQueryParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub is_qualified: Option<String>,
    pub score_min: Option<String>,
    pub score_max: Option<String>,
}

/// In-memory narrowing of an already-fetched lead list.
///
/// When `is_qualified` is present it replaces the status constraint instead
/// of being combined with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewFilter {
    /// Lowercased search needle.
    pub search: Option<String>,
    pub status: Option<LeadStatus>,
    pub is_qualified: Option<bool>,
    pub score_min: Option<f64>,
    pub score_max: Option<f64>,
}

impl ViewFilter {
    pub fn matches(&self, lead: &Lead) -> bool {
        if let Some(needle) = &self.search {
            let name = lead.lead_info.lead_name.to_lowercase();
            let company = lead.lead_info.company_name.to_lowercase();
            if !name.contains(needle.as_str()) && !company.contains(needle.as_str()) {
                return false;
            }
        }

        match (self.is_qualified, self.status) {
            (Some(expected), _) => {
                if lead.is_qualified != Some(expected) {
                    return false;
                }
            }
            (None, Some(status)) => {
                if lead.status != status {
                    return false;
                }
            }
            (None, None) => {}
        }

        if self.score_min.is_some_and(|min| lead.lead_score < min) {
            return false;
        }
        if self.score_max.is_some_and(|max| lead.lead_score > max) {
            return false;
        }
        true
    }

    /// Keeps matching leads in their original order.
    pub fn apply(&self, leads: &[Lead]) -> Vec<Lead> {
        leads
            .iter()
            .filter(|lead| self.matches(lead))
            .cloned()
            .collect()
    }
}

impl TryFrom<ViewQueryParams> for ViewFilter {
    type Error = AppError;

    fn try_from(params: ViewQueryParams) -> Result<Self, Self::Error> {
        let mut errors = Vec::new();

        let status = collect(
            non_empty(params.status)
                .filter(|raw| raw != "all")
                .map(|raw| raw.parse::<LeadStatus>())
                .transpose(),
            &mut errors,
        );
        let is_qualified = collect(
            non_empty(params.is_qualified)
                .map(|raw| match raw.as_str() {
                    "true" => Ok(true),
                    "false" => Ok(false),
                    other => Err(AppError::invalid(format!(
                        "isQualified must be true or false (got '{}')",
                        other
                    ))),
                })
                .transpose(),
            &mut errors,
        );
        let score_min = collect(parse_score(params.score_min, "scoreMin"), &mut errors);
        let score_max = collect(parse_score(params.score_max, "scoreMax"), &mut errors);

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(ViewFilter {
            search: non_empty(params.search).map(|s| s.to_lowercase()),
            status: status.flatten(),
            is_qualified: is_qualified.flatten(),
            score_min: score_min.flatten(),
            score_max: score_max.flatten(),
        })
    }
}

// ============ Parameter parsing ============

fn collect<T>(result: Result<T, AppError>, errors: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(AppError::Validation(messages)) => {
            errors.extend(messages);
            None
        }
        Err(other) => {
            errors.push(other.to_string());
            None
        }
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_score(raw: Option<String>, name: &str) -> Result<Option<f64>, AppError> {
    non_empty(raw)
        .map(|raw| match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(AppError::invalid(format!(
                "{} must be a number (got '{}')",
                name, raw
            ))),
        })
        .transpose()
}

fn parse_count(raw: Option<String>, name: &str) -> Result<Option<usize>, AppError> {
    non_empty(raw)
        .map(|raw| {
            raw.parse::<usize>().map_err(|_| {
                AppError::invalid(format!(
                    "{} must be a non-negative integer (got '{}')",
                    name, raw
                ))
            })
        })
        .transpose()
}

/// Accepts RFC 3339 instants or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: Option<String>, name: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    non_empty(raw)
        .map(|raw| {
            if let Ok(instant) = DateTime::parse_from_rfc3339(&raw) {
                return Ok(instant.with_timezone(&Utc));
            }
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|midnight| midnight.and_utc())
                .ok_or_else(|| {
                    AppError::invalid(format!(
                        "{} must be a date (YYYY-MM-DD or RFC 3339, got '{}')",
                        name, raw
                    ))
                })
        })
        .transpose()
}
