//! Loads ICP reference data from a JSON file into Postgres.
//!
//! Usage: `seed_icp [path]` (defaults to `icp-data.json` in the working
//! directory). The file holds an array of
//! `{icp_category, attribute, value, description}` objects where
//! `icp_category` is a category title; missing categories are created with
//! the title as their definition.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use lead_qualification_api::db::Database;
use lead_qualification_api::db_storage::PgStorage;
use lead_qualification_api::storage::IcpRepository;
use lead_qualification_api::validation::IcpDataDraft;

const DEFAULT_SEED_FILE: &str = "icp-data.json";

#[derive(Debug, Deserialize)]
struct SeedItem {
    icp_category: String,
    attribute: String,
    value: String,
    #[serde(default)]
    description: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seed_icp=info,lead_qualification_api=info".into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SEED_FILE.to_string());
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    let items: Vec<SeedItem> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;
    tracing::info!("Loaded {} ICP rows from {}", items.len(), path);

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set to seed ICP data")?;
    let db = Database::new(&database_url, 2).await?;
    let storage = PgStorage::new(db.pool.clone());

    let mut categories: HashMap<String, Uuid> = HashMap::new();
    let mut inserted = 0usize;

    for item in items {
        let category_id = match categories.get(&item.icp_category) {
            Some(id) => *id,
            None => {
                let id = match storage.find_category_by_title(&item.icp_category).await? {
                    Some(existing) => existing.id,
                    None => {
                        let created = storage
                            .create_category(
                                item.icp_category.clone(),
                                Some(item.icp_category.clone()),
                            )
                            .await?;
                        tracing::info!("Created category {}", created.title);
                        created.id
                    }
                };
                categories.insert(item.icp_category.clone(), id);
                id
            }
        };

        storage
            .create_data(IcpDataDraft {
                icp_category: category_id,
                attribute: item.attribute.clone(),
                value: item.value,
                description: item.description,
            })
            .await
            .with_context(|| format!("inserting ICP data '{}'", item.attribute))?;
        tracing::debug!("Inserted ICP data: {}", item.attribute);
        inserted += 1;
    }

    tracing::info!(
        "ICP seed complete: {} rows across {} categories",
        inserted,
        categories.len()
    );
    Ok(())
}
