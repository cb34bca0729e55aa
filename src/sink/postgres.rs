use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::ScanSink;

/// Stores scan documents in `rfid_scan_logs`. Insert-only.
#[derive(Clone)]
pub struct PgScanSink {
    pool: PgPool,
}

impl PgScanSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScanSink for PgScanSink {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn push(&self, document: &Value) -> anyhow::Result<String> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO rfid_scan_logs (id, tag_id, scan_result, document)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(document.get("tagId").and_then(Value::as_str))
        .bind(document.get("scanResult").and_then(Value::as_str))
        .bind(document)
        .execute(&self.pool)
        .await?;

        tracing::debug!(key = %id, "scan log stored in postgres");
        Ok(id.to_string())
    }
}
