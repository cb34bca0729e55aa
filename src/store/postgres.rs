use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::validate::{LookupError, PassLookup};
use crate::models::pass::{ApplicationStatus, RfidInfo, VehicleInfo, VehiclePassRecord};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // -- Vehicle Pass Operations --

    /// Fetch the pass assigned `tag_id`. Tags are not unique at the schema
    /// level, so the oldest matching application wins.
    pub async fn get_pass_by_tag(&self, tag_id: &str) -> Result<Option<PassRow>, sqlx::Error> {
        sqlx::query_as::<_, PassRow>(
            r#"SELECT id, status, plate_number, vehicle_type, driver_name, linked_user_id,
                      rfid_tag_id, rfid_is_active, rfid_valid_until, rfid_assigned_at
               FROM vehicle_pass_applications
               WHERE rfid_tag_id = $1
               ORDER BY created_at ASC, id ASC
               LIMIT 1"#,
        )
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl PassLookup for PgStore {
    async fn find_by_tag(&self, tag_id: &str) -> Result<Option<VehiclePassRecord>, LookupError> {
        self.get_pass_by_tag(tag_id)
            .await?
            .map(VehiclePassRecord::try_from)
            .transpose()
    }

    async fn ping(&self) -> Result<(), LookupError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PassRow {
    pub id: Uuid,
    pub status: String,
    pub plate_number: String,
    pub vehicle_type: String,
    pub driver_name: Option<String>,
    pub linked_user_id: Option<Uuid>,
    pub rfid_tag_id: Option<String>,
    pub rfid_is_active: bool,
    pub rfid_valid_until: Option<DateTime<Utc>>,
    pub rfid_assigned_at: Option<DateTime<Utc>>,
}

impl TryFrom<PassRow> for VehiclePassRecord {
    type Error = LookupError;

    fn try_from(row: PassRow) -> Result<Self, Self::Error> {
        let status: ApplicationStatus = row.status.parse().map_err(|e| LookupError::Malformed {
            id: row.id.to_string(),
            reason: format!("{}", e),
        })?;

        let rfid = row.rfid_tag_id.map(|tag_id| RfidInfo {
            tag_id,
            is_active: row.rfid_is_active,
            valid_until: row.rfid_valid_until,
            assigned_at: row.rfid_assigned_at,
        });

        Ok(VehiclePassRecord {
            id: row.id,
            status,
            vehicle: VehicleInfo {
                plate_number: row.plate_number,
                vehicle_type: row.vehicle_type,
                driver_name: row.driver_name,
            },
            rfid,
            linked_user_id: row.linked_user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> PassRow {
        PassRow {
            id: Uuid::new_v4(),
            status: status.to_string(),
            plate_number: "NBC-4412".into(),
            vehicle_type: "car".into(),
            driver_name: None,
            linked_user_id: None,
            rfid_tag_id: Some("E2800001".into()),
            rfid_is_active: true,
            rfid_valid_until: None,
            rfid_assigned_at: None,
        }
    }

    #[test]
    fn test_row_converts_to_record() {
        let record = VehiclePassRecord::try_from(row("completed")).unwrap();
        assert_eq!(record.status, ApplicationStatus::Completed);
        assert_eq!(record.vehicle.plate_number, "NBC-4412");
        assert!(record.rfid.unwrap().is_active);
    }

    #[test]
    fn test_row_without_tag_has_no_rfid() {
        let mut r = row("approved");
        r.rfid_tag_id = None;
        assert!(VehiclePassRecord::try_from(r).unwrap().rfid.is_none());
    }

    #[test]
    fn test_unknown_status_is_a_lookup_fault() {
        let err = VehiclePassRecord::try_from(row("archived")).unwrap_err();
        assert!(matches!(err, LookupError::Malformed { .. }));
    }
}
