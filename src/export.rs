//! Export shapes for leads and ICP rows (normalized JSON and CSV).

use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::{ExportedIcp, Lead, LeadData, Revenue};

/// Lead CSV header row.
pub const LEAD_CSV_HEADERS: [&str; 18] = [
    "Lead ID",
    "Lead Name",
    "Email",
    "Company",
    "Job Title",
    "Industry",
    "Location",
    "Monthly Budget",
    "Lead Score",
    "Budget Score",
    "Authority Score",
    "Need Score",
    "Timeline Score",
    "Status",
    "Qualified",
    "Final Status",
    "Reason",
    "Created At",
];

/// Export requests may ask for `format=csv`; JSON otherwise.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct FormatParams {
    pub format: Option<String>,
}

impl FormatParams {
    pub fn wants_csv(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|format| format.eq_ignore_ascii_case("csv"))
    }
}

/// Lead document with every optional text normalized to `""`, the tech
/// stack to `[]` and the discovery notes to an empty record.
pub fn normalized_lead(lead: &Lead) -> Value {
    let info = &lead.lead_info;
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let lead_data = info.lead_data.clone().unwrap_or_default();
    let revenue = match &info.revenue {
        Some(Revenue::Amount(amount)) => json!(amount),
        Some(Revenue::Text(text)) => json!(text),
        None => json!(""),
    };

    json!({
        "_id": lead.id,
        "budgetScore": lead.budget_score,
        "budgetEvidence": text(&lead.budget_evidence),
        "authorityScore": lead.authority_score,
        "authorityEvidence": text(&lead.authority_evidence),
        "needScore": lead.need_score,
        "needEvidence": text(&lead.need_evidence),
        "timelineScore": lead.timeline_score,
        "timelineEvidence": text(&lead.timeline_evidence),
        "overallAssessment": text(&lead.overall_assessment),
        "qualificationReason": text(&lead.qualification_reason),
        "disQualificationReason": text(&lead.dis_qualification_reason),
        "recommendedAction": text(&lead.recommended_action),
        "finalStatus": lead.final_status,
        "status": lead.status,
        "leadScore": lead.lead_score,
        "isQualified": lead.is_qualified.unwrap_or(false),
        "leadInfo": {
            "leadName": info.lead_name,
            "leadPhone": text(&info.lead_phone),
            "companyName": info.company_name,
            "jobTitle": text(&info.job_title),
            "leadEmail": info.lead_email,
            "companyWebsite": text(&info.company_website),
            "leadIndustry": text(&info.lead_industry),
            "coSize": text(&info.co_size),
            "techTeamSize": text(&info.tech_team_size),
            "revenue": revenue,
            "location": text(&info.location),
            "businessModel": text(&info.business_model),
            "monthlyBudget": text(&info.monthly_budget),
            "techStack": info.tech_stack,
            "opportunity_type": text(&info.opportunity_type),
            "timeline": text(&info.timeline),
            "leadData": normalized_lead_data(&lead_data),
            "receiverEmail": text(&info.receiver_email),
            "receiverName": text(&info.receiver_name),
        },
        "createdAt": lead.created_at,
        "updatedAt": lead.updated_at,
    })
}

fn normalized_lead_data(data: &LeadData) -> Value {
    json!({
        "success_criteria": data.success_criteria,
        "lead_type": data.lead_type.clone().unwrap_or_default(),
        "primary_need": data.primary_need.clone().unwrap_or_default(),
        "proposed_solution": data.proposed_solution.clone().unwrap_or_default(),
    })
}

/// Renders leads as CSV, one row per lead.
pub fn leads_to_csv(leads: &[Lead]) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(LEAD_CSV_HEADERS).map_err(csv_error)?;

    for lead in leads {
        let info = &lead.lead_info;
        let reason = if lead.is_qualified == Some(true) {
            lead.qualification_reason.as_deref()
        } else {
            lead.dis_qualification_reason.as_deref()
        };
        let record = [
            lead.id.to_string(),
            info.lead_name.clone(),
            info.lead_email.clone(),
            info.company_name.clone(),
            info.job_title.clone().unwrap_or_default(),
            info.lead_industry.clone().unwrap_or_default(),
            info.location.clone().unwrap_or_default(),
            info.monthly_budget.clone().unwrap_or_default(),
            lead.lead_score.to_string(),
            lead.budget_score.to_string(),
            lead.authority_score.to_string(),
            lead.need_score.to_string(),
            lead.timeline_score.to_string(),
            lead.status.to_string(),
            lead.is_qualified.unwrap_or(false).to_string(),
            lead.final_status.clone(),
            reason.unwrap_or_default().to_string(),
            lead.created_at
                .map(|created_at| created_at.to_rfc3339())
                .unwrap_or_default(),
        ];
        writer.write_record(&record).map_err(csv_error)?;
    }

    finish(writer)
}

/// ICP CSV header row, matching the `ExportedIcp` field names.
pub const ICP_CSV_HEADERS: [&str; 5] = ["icp_category", "attribute", "value", "description", "definition"];

/// Renders flattened ICP rows as CSV.
pub fn icp_to_csv(rows: &[ExportedIcp]) -> Result<String, AppError> {
    serialize_rows(rows, &ICP_CSV_HEADERS)
}

/// `serialize` derives the header from the first row; an empty export still
/// gets one.
fn serialize_rows<T: Serialize>(rows: &[T], headers: &[&str]) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(headers).map_err(csv_error)?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, AppError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::InternalError(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::InternalError(format!("CSV output is not UTF-8: {}", e)))
}

fn csv_error(err: csv::Error) -> AppError {
    AppError::InternalError(format!("CSV encoding failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lead() -> Lead {
        serde_json::from_value(json!({
            "_id": "0b3c8a0e-2c55-4b8e-93a1-6c0e1f4a7d20",
            "budgetScore": 7,
            "authorityScore": 6,
            "needScore": 8,
            "timelineScore": 5,
            "finalStatus": "Disqualified",
            "status": "Disqualified",
            "leadScore": 3.5,
            "isQualified": false,
            "disQualificationReason": "No budget, \"maybe\" next year",
            "leadInfo": {
                "leadName": "Sam Ortiz",
                "leadEmail": "sam@globex.com",
                "companyName": "Globex, Inc."
            },
            "createdAt": "2024-02-10T08:30:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn normalized_lead_fills_missing_text() {
        let value = normalized_lead(&sample_lead());
        assert_eq!(value["budgetEvidence"], "");
        assert_eq!(value["leadInfo"]["techStack"], json!([]));
        assert_eq!(value["leadInfo"]["revenue"], "");
        assert_eq!(value["leadInfo"]["leadData"]["success_criteria"], json!([]));
        assert_eq!(value["leadInfo"]["leadData"]["primary_need"], "");
    }

    #[test]
    fn lead_csv_quotes_commas_and_quotes() {
        let csv = leads_to_csv(&[sample_lead()]).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Lead ID,Lead Name,Email,Company"));
        let row = lines.next().unwrap();
        assert!(row.contains("\"Globex, Inc.\""));
        assert!(row.contains("\"No budget, \"\"maybe\"\" next year\""));
        assert!(row.ends_with("2024-02-10T08:30:00+00:00"));
    }

    #[test]
    fn empty_icp_csv_keeps_header() {
        assert_eq!(
            icp_to_csv(&[]).unwrap(),
            "icp_category,attribute,value,description,definition\n"
        );
    }

    #[test]
    fn icp_csv_uses_field_names_as_header() {
        let csv = icp_to_csv(&[ExportedIcp {
            icp_category: "Firmographics".into(),
            attribute: "Headcount".into(),
            value: "50-200".into(),
            description: String::new(),
            definition: "Company shape".into(),
        }])
        .unwrap();
        assert_eq!(
            csv,
            "icp_category,attribute,value,description,definition\nFirmographics,Headcount,50-200,,Company shape\n"
        );
    }
}
