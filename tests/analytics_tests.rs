use serde_json::json;

use lead_qualification_api::analytics::calculate_analytics;
use lead_qualification_api::filters::{LeadQuery, LeadQueryParams};
use lead_qualification_api::models::Lead;

fn lead(score: f64, qualified: bool, status: &str, created_at: &str) -> Lead {
    serde_json::from_value(json!({
        "_id": uuid::Uuid::new_v4(),
        "budgetScore": 5, "authorityScore": 5, "needScore": 5, "timelineScore": 5,
        "status": status,
        "leadScore": score,
        "isQualified": qualified,
        "leadInfo": { "leadName": "Alex", "leadEmail": "alex@example.com", "companyName": "Vandelay" },
        "createdAt": format!("{}T00:00:00Z", created_at)
    }))
    .unwrap()
}

#[test]
fn three_lead_dashboard_scenario() {
    let leads = vec![
        lead(2.0, true, "Qualified", "2024-01-15"),
        lead(9.0, false, "Disqualified", "2024-01-20"),
        lead(4.0, false, "Low Priority Lead", "2024-02-01"),
    ];

    let data = calculate_analytics(&leads);
    let value = serde_json::to_value(&data).unwrap();

    assert_eq!(data.total_leads, 3);
    assert_eq!(data.qualified_leads, 1);
    assert_eq!(data.disqualified_leads, 2);
    assert_eq!(data.low_priority_leads, 1);
    assert_eq!(data.qualification_rate, 33.33);
    assert_eq!(data.average_score, 5.0);

    // 2.0 and 4.0 sit on shared edges and are counted twice
    assert_eq!(
        value["scoreDistribution"],
        json!([
            { "range": "0-2", "count": 1 },
            { "range": "2-4", "count": 2 },
            { "range": "4-6", "count": 1 },
            { "range": "6-8", "count": 0 },
            { "range": "8-10", "count": 1 }
        ])
    );
    assert_eq!(
        value["leadsByStatusOverTime"],
        json!([
            { "date": "2024-01", "qualified": 1, "disqualified": 1, "lowPriority": 0 },
            { "date": "2024-02", "qualified": 0, "disqualified": 0, "lowPriority": 1 }
        ])
    );
    assert_eq!(value["leadsByIndustry"], json!({ "Unknown": 3 }));
}

#[test]
fn boundary_score_is_double_counted() {
    let data = calculate_analytics(&[lead(4.0, true, "Qualified", "2024-06-01")]);
    let total: usize = data.score_distribution.iter().map(|bucket| bucket.count).sum();
    assert_eq!(total, 2);
}

#[test]
fn query_filter_selects_qualified_mid_range_leads() {
    let query = LeadQuery::try_from(LeadQueryParams {
        is_qualified: Some("true".into()),
        score_min: Some("5".into()),
        score_max: Some("8".into()),
        ..Default::default()
    })
    .unwrap();

    assert!(query.filter.matches(&lead(7.0, true, "Qualified", "2024-01-01")));
    assert!(!query.filter.matches(&lead(9.0, true, "Qualified", "2024-01-01")));
    assert!(!query.filter.matches(&lead(7.0, false, "Disqualified", "2024-01-01")));
}
