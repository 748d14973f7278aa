pub mod error;

pub use error::{RegistryError, Result};

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use timeline_common::{FetchWindow, RawEncounter};

/// Surgeries and ER visits share one shape. Ids are prefixed by kind because
/// the two tables have independent sequences. Timestamps are cast so the query
/// works whether the columns are stored with or without a zone.
const ENCOUNTERS_QUERY: &str = "
SELECT 'surgery-' || id::text       AS id,
       'surgery'                    AS kind,
       start_time::timestamptz      AS start_time,
       end_time::timestamptz        AS end_time,
       surgeon_name                 AS clinician,
       procedure                    AS summary,
       flag
FROM surgeries
WHERE patient_id = $1
  AND ($2::timestamptz IS NULL OR start_time >= $2)
  AND ($3::timestamptz IS NULL OR start_time <= $3)
UNION ALL
SELECT 'er-' || id::text            AS id,
       'emergency_room'             AS kind,
       start_time::timestamptz      AS start_time,
       end_time::timestamptz        AS end_time,
       attending_physician          AS clinician,
       chief_complaint              AS summary,
       flag
FROM emergency_rooms
WHERE patient_id = $1
  AND ($2::timestamptz IS NULL OR start_time >= $2)
  AND ($3::timestamptz IS NULL OR start_time <= $3)
";

#[derive(Debug, sqlx::FromRow)]
struct EncounterRow {
    id: String,
    kind: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    clinician: Option<String>,
    summary: Option<String>,
    flag: Option<String>,
}

impl From<EncounterRow> for RawEncounter {
    fn from(row: EncounterRow) -> Self {
        RawEncounter {
            id: row.id,
            kind: row.kind,
            start: row.start_time,
            end: row.end_time,
            clinician: row.clinician,
            summary: row.summary,
            flag: row.flag,
        }
    }
}

#[derive(Clone)]
pub struct RegistryClient {
    pool: PgPool,
}

impl RegistryClient {
    /// Build a pool without connecting. Connections are opened on first use,
    /// so the service can start while the registry is down.
    pub fn connect_lazy(database_url: &str, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)
            .map_err(|e| RegistryError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All encounters for a patient whose start falls inside the window.
    pub async fn fetch_encounters(
        &self,
        patient_id: i64,
        window: &FetchWindow,
    ) -> Result<Vec<RawEncounter>> {
        let rows = sqlx::query_as::<_, EncounterRow>(ENCOUNTERS_QUERY)
            .bind(patient_id)
            .bind(window.from)
            .bind(window.to)
            .fetch_all(&self.pool)
            .await?;

        debug!(patient_id, count = rows.len(), "Fetched encounters from registry");
        Ok(rows.into_iter().map(RawEncounter::from).collect())
    }
}
