// Trait seams between the engine and the upstream services.
//
// EncounterSource: encounter registry (surgeries, ER visits)
// ImagingSource:   imaging archive studies
// VitalsSource:    vitals monitor readings
//
// Each call returns the complete record list or one error, never a truncated
// list. Timeouts are applied by the orchestrator, not here. Test mocks live in
// `crate::testing`.

use anyhow::Result;
use async_trait::async_trait;

use timeline_common::{FetchWindow, RawEncounter, RawReading, RawStudy};

#[async_trait]
pub trait EncounterSource: Send + Sync {
    async fn fetch_encounters(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<RawEncounter>>;
}

#[async_trait]
pub trait ImagingSource: Send + Sync {
    async fn fetch_studies(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<RawStudy>>;
}

#[async_trait]
pub trait VitalsSource: Send + Sync {
    async fn fetch_readings(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<RawReading>>;
}

#[async_trait]
impl EncounterSource for registry_client::RegistryClient {
    async fn fetch_encounters(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<RawEncounter>> {
        Ok(self.fetch_encounters(patient_id, window).await?)
    }
}

#[async_trait]
impl ImagingSource for imaging_client::ImagingClient {
    async fn fetch_studies(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<RawStudy>> {
        Ok(self.fetch_studies(patient_id, window).await?)
    }
}

#[async_trait]
impl VitalsSource for vitals_client::VitalsClient {
    async fn fetch_readings(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<RawReading>> {
        Ok(self.fetch_readings(patient_id, window).await?)
    }
}
