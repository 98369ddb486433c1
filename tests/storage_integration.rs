use serde_json::json;
use std::env;
use uuid::Uuid;

use lead_qualification_api::db::Database;
use lead_qualification_api::db_storage::PgStorage;
use lead_qualification_api::filters::{LeadFilter, LeadQuery};
use lead_qualification_api::models::LeadStatus;
use lead_qualification_api::storage::{IcpDataFilter, IcpRepository, LeadRepository};
use lead_qualification_api::validation::{prepare_new_lead, IcpDataDraft};

async fn storage() -> anyhow::Result<PgStorage> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;
    let db = Database::new(&db_url, 2).await?;
    Ok(PgStorage::new(db.pool.clone()))
}

/// Integration smoke test for the Postgres lead store.
/// Marked ignored so it only runs against a scratch database; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn lead_round_trip_smoke_test() -> anyhow::Result<()> {
    let storage = storage().await?;

    // Unique email to avoid conflicts on repeated runs
    let email = format!("smoke-{}@example.com", Uuid::new_v4().simple());
    let lead = prepare_new_lead(json!({
        "budgetScore": 8, "authorityScore": 7, "needScore": 9, "timelineScore": 6,
        "finalStatus": "Qualified", "status": "Qualified",
        "leadScore": 7.5, "isQualified": true,
        "leadInfo": { "leadName": "Smoke Test", "leadEmail": email, "companyName": "Smoke Co" }
    }))?;

    let created = storage.create(lead.clone()).await?;
    assert_ne!(created.id, Uuid::nil());
    assert!(storage.create(lead).await.unwrap_err().is_conflict());

    let updated = storage
        .update(created.id, &json!({ "status": "Low Priority Lead" }))
        .await?;
    assert_eq!(updated.status, LeadStatus::LowPriority);
    assert_eq!(updated.created_at, created.created_at);

    let found = storage
        .find(&LeadQuery {
            filter: LeadFilter {
                status: Some(LeadStatus::LowPriority),
                score_min: Some(7.5),
                score_max: Some(7.5),
                ..Default::default()
            },
            page: None,
        })
        .await?;
    assert!(found.iter().any(|lead| lead.id == created.id));

    storage.delete(created.id).await?;
    assert!(storage.get(created.id).await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
#[ignore]
async fn icp_rows_resolve_their_category_smoke_test() -> anyhow::Result<()> {
    let storage = storage().await?;

    let title = format!("smoke-{}", Uuid::new_v4().simple());
    let category = storage
        .create_category(title.clone(), Some("temp".into()))
        .await?;
    assert!(storage
        .create_category(title.clone(), None)
        .await
        .unwrap_err()
        .is_conflict());

    let row = storage
        .create_data(IcpDataDraft {
            icp_category: category.id,
            attribute: "smoke_attr%".into(),
            value: "smoke-val".into(),
            description: None,
        })
        .await?;

    let listed = storage
        .list_data(&IcpDataFilter {
            category: Some(category.id),
            search: Some("ATTR%".into()),
        })
        .await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].icp_category.title(), title);

    storage.delete_category(category.id).await?;
    assert_eq!(storage.get_data(row.id).await?.icp_category.title(), "Unknown");
    storage.delete_data(row.id).await?;
    Ok(())
}
