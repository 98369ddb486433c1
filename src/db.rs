use sqlx::{postgres::PgPoolOptions, PgPool};

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        // Idempotent: every statement is IF NOT EXISTS
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        tracing::info!("Database schema ensured");

        Ok(Self { pool })
    }
}
