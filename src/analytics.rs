//! Dashboard statistics computed from a list of leads.

use chrono::{Datelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::models::{Lead, LeadOutcome, LeadStatus};

/// Histogram buckets over `leadScore`. Both ends are inclusive, so a score
/// sitting on a shared edge is counted in the two adjacent buckets.
pub const SCORE_BUCKETS: [(&str, f64, f64); 5] = [
    ("0-2", 0.0, 2.0),
    ("2-4", 2.0, 4.0),
    ("4-6", 4.0, 6.0),
    ("6-8", 6.0, 8.0),
    ("8-10", 8.0, 10.0),
];

pub const TOP_INDUSTRIES: usize = 5;
pub const MONTHS_IN_TIMELINE: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryCount {
    pub industry: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBucket {
    pub range: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyOutcomes {
    /// `YYYY-MM`
    pub date: String,
    pub qualified: usize,
    pub disqualified: usize,
    pub low_priority: usize,
}

/// Fixed-shape summary rendered by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub total_leads: usize,
    pub qualified_leads: usize,
    pub disqualified_leads: usize,
    pub low_priority_leads: usize,
    /// Percentage on a 0-100 scale.
    pub qualification_rate: f64,
    pub average_score: f64,
    pub leads_by_industry: BTreeMap<String, usize>,
    pub leads_by_status_over_time: Vec<MonthlyOutcomes>,
    pub top_industries: Vec<IndustryCount>,
    pub score_distribution: Vec<ScoreBucket>,
}

/// The `stats` block of the lead list response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStats {
    pub total: usize,
    pub qualified: usize,
    pub disqualified: usize,
    pub low_priority: usize,
    /// Unrounded mean of `leadScore`.
    pub average_score: f64,
}

impl LeadStats {
    pub fn from_leads(leads: &[Lead]) -> Self {
        let total = leads.len();
        Self {
            total,
            qualified: count_qualified(leads, true),
            disqualified: count_qualified(leads, false),
            low_priority: count_low_priority(leads),
            average_score: mean_score(leads),
        }
    }
}

/// Half-up rounding to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn calculate_analytics(leads: &[Lead]) -> AnalyticsData {
    let total_leads = leads.len();
    let qualified_leads = count_qualified(leads, true);
    let disqualified_leads = count_qualified(leads, false);
    let low_priority_leads = count_low_priority(leads);

    let qualification_rate = if total_leads > 0 {
        round2(qualified_leads as f64 / total_leads as f64 * 100.0)
    } else {
        0.0
    };

    let industries = industry_counts(leads);
    let top_industries = top_industries(&industries);

    AnalyticsData {
        total_leads,
        qualified_leads,
        disqualified_leads,
        low_priority_leads,
        qualification_rate,
        average_score: round2(mean_score(leads)),
        leads_by_industry: industries.into_iter().collect(),
        leads_by_status_over_time: outcomes_by_month(leads),
        top_industries,
        score_distribution: score_distribution(leads),
    }
}

fn count_qualified(leads: &[Lead], qualified: bool) -> usize {
    leads
        .iter()
        .filter(|lead| lead.is_qualified == Some(qualified))
        .count()
}

fn count_low_priority(leads: &[Lead]) -> usize {
    leads
        .iter()
        .filter(|lead| lead.status == LeadStatus::LowPriority)
        .count()
}

fn mean_score(leads: &[Lead]) -> f64 {
    if leads.is_empty() {
        return 0.0;
    }
    leads.iter().map(|lead| lead.lead_score).sum::<f64>() / leads.len() as f64
}

/// Industry counts in first-seen order.
fn industry_counts(leads: &[Lead]) -> Vec<(String, usize)> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for lead in leads {
        let industry = lead.industry();
        match position.get(industry) {
            Some(&index) => counts[index].1 += 1,
            None => {
                position.insert(industry, counts.len());
                counts.push((industry.to_string(), 1));
            }
        }
    }
    counts
}

fn top_industries(counts: &[(String, usize)]) -> Vec<IndustryCount> {
    let mut ranked: Vec<IndustryCount> = counts
        .iter()
        .map(|(industry, count)| IndustryCount {
            industry: industry.clone(),
            count: *count,
        })
        .collect();
    // sort_by is stable: ties keep first-seen order
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(TOP_INDUSTRIES);
    ranked
}

fn score_distribution(leads: &[Lead]) -> Vec<ScoreBucket> {
    SCORE_BUCKETS
        .iter()
        .map(|(range, min, max)| ScoreBucket {
            range: range.to_string(),
            count: leads
                .iter()
                .filter(|lead| lead.lead_score >= *min && lead.lead_score <= *max)
                .count(),
        })
        .collect()
}

fn outcomes_by_month(leads: &[Lead]) -> Vec<MonthlyOutcomes> {
    let now = Utc::now();
    let mut months: BTreeMap<String, MonthlyOutcomes> = BTreeMap::new();

    for lead in leads {
        let created_at = lead.created_at.unwrap_or(now);
        let key = format!("{}-{:02}", created_at.year(), created_at.month());
        let bucket = months.entry(key.clone()).or_insert_with(|| MonthlyOutcomes {
            date: key,
            ..Default::default()
        });
        match lead.outcome() {
            LeadOutcome::Qualified => bucket.qualified += 1,
            LeadOutcome::Disqualified => bucket.disqualified += 1,
            LeadOutcome::LowPriority | LeadOutcome::Pending => bucket.low_priority += 1,
        }
    }

    // BTreeMap iterates keys ascending; keep the most recent months
    let skip = months.len().saturating_sub(MONTHS_IN_TIMELINE);
    months.into_values().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LeadInfo;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn lead(score: f64, industry: Option<&str>) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            budget_score: 5.0,
            budget_evidence: None,
            authority_score: 5.0,
            authority_evidence: None,
            need_score: 5.0,
            need_evidence: None,
            timeline_score: 5.0,
            timeline_evidence: None,
            overall_assessment: None,
            qualification_reason: None,
            dis_qualification_reason: None,
            recommended_action: None,
            final_status: String::new(),
            status: LeadStatus::Pending,
            lead_score: score,
            is_qualified: None,
            lead_info: LeadInfo {
                lead_name: "Lead".into(),
                lead_email: format!("{}@example.com", Uuid::new_v4()),
                company_name: "Co".into(),
                lead_phone: None,
                job_title: None,
                company_website: None,
                lead_industry: industry.map(str::to_string),
                co_size: None,
                tech_team_size: None,
                revenue: None,
                location: None,
                business_model: None,
                monthly_budget: None,
                tech_stack: Vec::new(),
                opportunity_type: None,
                timeline: None,
                lead_data: None,
                receiver_email: None,
                receiver_name: None,
            },
            created_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
            updated_at: None,
        }
    }

    #[test]
    fn empty_input_yields_zeroes() {
        let data = calculate_analytics(&[]);
        assert_eq!(data.total_leads, 0);
        assert_eq!(data.qualification_rate, 0.0);
        assert_eq!(data.average_score, 0.0);
        assert!(data.top_industries.is_empty());
        assert!(data.leads_by_status_over_time.is_empty());
        assert_eq!(data.score_distribution.len(), 5);
        assert!(data.score_distribution.iter().all(|b| b.count == 0));
    }

    #[test]
    fn boundary_scores_count_in_both_buckets() {
        let data = calculate_analytics(&[lead(4.0, None)]);
        let counts: Vec<usize> = data.score_distribution.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![0, 1, 1, 0, 0]);
    }

    #[test]
    fn blank_industry_is_unknown() {
        let data = calculate_analytics(&[lead(1.0, Some("")), lead(1.0, None)]);
        assert_eq!(data.leads_by_industry.get("Unknown"), Some(&2));
    }

    #[test]
    fn top_industries_keep_first_seen_order_on_ties() {
        let leads: Vec<Lead> = ["Retail", "Fintech", "Health", "Fintech", "Retail", "Gov", "Edu", "Media"]
            .iter()
            .map(|industry| lead(5.0, Some(industry)))
            .collect();
        let top: Vec<(String, usize)> = calculate_analytics(&leads)
            .top_industries
            .into_iter()
            .map(|entry| (entry.industry, entry.count))
            .collect();
        assert_eq!(
            top,
            vec![
                ("Retail".to_string(), 2),
                ("Fintech".to_string(), 2),
                ("Health".to_string(), 1),
                ("Gov".to_string(), 1),
                ("Edu".to_string(), 1),
            ]
        );
    }

    #[test]
    fn timeline_keeps_last_twelve_months() {
        let leads: Vec<Lead> = (0..15)
            .map(|i| {
                let mut l = lead(5.0, None);
                let year = 2023 + (i / 12);
                let month = (i % 12) + 1;
                l.created_at = Some(Utc.with_ymd_and_hms(year, month as u32, 10, 0, 0, 0).unwrap());
                l
            })
            .collect();
        let timeline = calculate_analytics(&leads).leads_by_status_over_time;
        assert_eq!(timeline.len(), 12);
        assert_eq!(timeline.first().unwrap().date, "2023-04");
        assert_eq!(timeline.last().unwrap().date, "2024-03");
    }

    #[test]
    fn rounding_is_half_up_to_two_places() {
        assert_eq!(round2(33.3333), 33.33);
        assert_eq!(round2(66.6666), 66.67);
        assert_eq!(round2(5.0), 5.0);
    }

    #[test]
    fn stats_report_unrounded_mean() {
        let stats = LeadStats::from_leads(&[lead(1.0, None), lead(2.0, None), lead(2.0, None)]);
        assert_eq!(stats.total, 3);
        assert!((stats.average_score - 5.0 / 3.0).abs() < 1e-12);
    }
}
