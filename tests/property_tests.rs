/// Property-based tests using proptest
/// Tests invariants of the analytics aggregator and the lead filter
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use lead_qualification_api::analytics::{calculate_analytics, TOP_INDUSTRIES, MONTHS_IN_TIMELINE};
use lead_qualification_api::filters::{apply_query, LeadFilter, LeadQuery, Page};
use lead_qualification_api::models::{Lead, LeadInfo, LeadStatus};

const INDUSTRIES: [&str; 8] = [
    "SaaS", "Fintech", "Retail", "Health", "Logistics", "Media", "Energy", "",
];

fn arb_status() -> impl Strategy<Value = LeadStatus> {
    prop::sample::select(LeadStatus::ALL.to_vec())
}

prop_compose! {
    fn arb_lead()(
        score in 0.0f64..=10.0,
        is_qualified in prop::option::of(any::<bool>()),
        status in arb_status(),
        industry in prop::sample::select(INDUSTRIES.to_vec()),
        month_offset in 0i64..36,
        day in 1u32..=28,
    ) -> Lead {
        let created_at = Utc
            .with_ymd_and_hms(2022, 1, day, 9, 0, 0)
            .unwrap()
            + chrono::Duration::days(month_offset * 31);
        Lead {
            id: uuid::Uuid::new_v4(),
            budget_score: score,
            budget_evidence: None,
            authority_score: score,
            authority_evidence: None,
            need_score: score,
            need_evidence: None,
            timeline_score: score,
            timeline_evidence: None,
            overall_assessment: None,
            qualification_reason: None,
            dis_qualification_reason: None,
            recommended_action: None,
            final_status: String::new(),
            status,
            lead_score: score,
            is_qualified,
            lead_info: LeadInfo {
                lead_name: "Pat".into(),
                lead_email: "pat@example.com".into(),
                company_name: "Acme".into(),
                lead_phone: None,
                job_title: None,
                company_website: None,
                lead_industry: Some(industry.to_string()),
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
            created_at: Some(created_at),
            updated_at: Some(created_at),
        }
    }
}

proptest! {
    #[test]
    fn qualified_and_disqualified_never_exceed_total(leads in prop::collection::vec(arb_lead(), 0..60)) {
        let data = calculate_analytics(&leads);
        prop_assert!(data.qualified_leads + data.disqualified_leads <= data.total_leads);
        prop_assert!(data.low_priority_leads <= data.total_leads);
        prop_assert!((0.0..=100.0).contains(&data.qualification_rate));
    }

    #[test]
    fn top_industries_are_bounded_and_non_increasing(leads in prop::collection::vec(arb_lead(), 0..60)) {
        let data = calculate_analytics(&leads);
        prop_assert!(data.top_industries.len() <= TOP_INDUSTRIES);
        for pair in data.top_industries.windows(2) {
            prop_assert!(pair[0].count >= pair[1].count);
        }
        let counted: usize = data.leads_by_industry.values().sum();
        prop_assert_eq!(counted, data.total_leads);
    }

    #[test]
    fn timeline_is_bounded_and_ascending(leads in prop::collection::vec(arb_lead(), 0..60)) {
        let data = calculate_analytics(&leads);
        prop_assert!(data.leads_by_status_over_time.len() <= MONTHS_IN_TIMELINE);
        for pair in data.leads_by_status_over_time.windows(2) {
            prop_assert!(pair[0].date < pair[1].date);
        }
    }

    #[test]
    fn every_score_lands_in_at_least_one_bucket(leads in prop::collection::vec(arb_lead(), 0..60)) {
        let data = calculate_analytics(&leads);
        let bucketed: usize = data.score_distribution.iter().map(|bucket| bucket.count).sum();
        prop_assert!(bucketed >= data.total_leads);
    }

    #[test]
    fn paged_results_are_newest_first_and_filtered(
        leads in prop::collection::vec(arb_lead(), 0..60),
        min in 0.0f64..=10.0,
        limit in 1usize..20,
        offset in 0usize..20,
    ) {
        let query = LeadQuery {
            filter: LeadFilter { score_min: Some(min), ..Default::default() },
            page: Some(Page { limit, offset }),
        };
        let page = apply_query(leads.clone(), &query);

        prop_assert!(page.len() <= limit);
        prop_assert!(page.iter().all(|lead| lead.lead_score >= min));
        for pair in page.windows(2) {
            prop_assert!(pair[0].created_at >= pair[1].created_at);
        }
        let matching = leads.iter().filter(|lead| lead.lead_score >= min).count();
        prop_assert_eq!(page.len(), matching.saturating_sub(offset).min(limit));
    }
}

#[test]
fn empty_input_produces_zero_rates() {
    let data = calculate_analytics(&[]);
    assert_eq!(data.qualification_rate, 0.0);
    assert_eq!(data.average_score, 0.0);
    assert!(data.leads_by_status_over_time.is_empty());
}
