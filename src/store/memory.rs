use super::{MediaStore, ReportRepository};
use crate::error::{PipelineError, Result};
use crate::model::{Report, ReportStatus};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

fn poisoned(what: &str) -> PipelineError {
    PipelineError::Storage(format!("{what} lock poisoned"))
}

#[derive(Debug, Default)]
pub struct MemoryMediaStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, media_id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.blobs
            .lock()
            .map_err(|_| poisoned("media store"))?
            .insert(media_id.into(), bytes.into());
        Ok(())
    }
}

impl MediaStore for MemoryMediaStore {
    fn get_blob(&self, media_id: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .map_err(|_| poisoned("media store"))?
            .get(media_id)
            .cloned()
            .ok_or_else(|| PipelineError::BlobMissing(media_id.to_string()))
    }
}

#[derive(Debug)]
struct Entry {
    report: Report,
    updates: u32,
}

#[derive(Debug, Default)]
pub struct MemoryReportRepository {
    reports: Mutex<HashMap<String, Entry>>,
}

impl MemoryReportRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.reports.lock().map_err(|_| poisoned("report repository"))
    }

    pub fn insert(&self, report: Report) -> Result<()> {
        self.entries()?.insert(
            report.id.clone(),
            Entry {
                report,
                updates: 0,
            },
        );
        Ok(())
    }

    pub fn remove(&self, report_id: &str) -> Result<Option<Report>> {
        Ok(self.entries()?.remove(report_id).map(|e| e.report))
    }

    pub fn update_count(&self, report_id: &str) -> Result<u32> {
        Ok(self.entries()?.get(report_id).map_or(0, |e| e.updates))
    }
}

impl ReportRepository for MemoryReportRepository {
    fn exists(&self, report_id: &str) -> Result<bool> {
        Ok(self.entries()?.contains_key(report_id))
    }

    fn load(&self, report_id: &str) -> Result<Option<Report>> {
        Ok(self.entries()?.get(report_id).map(|e| e.report.clone()))
    }

    fn update_status_and_anomaly(
        &self,
        report_id: &str,
        status: ReportStatus,
        label: &str,
        snapshot: &[u8],
    ) -> Result<()> {
        let mut entries = self.entries()?;
        let entry = entries
            .get_mut(report_id)
            .ok_or_else(|| PipelineError::ReportVanished(report_id.to_string()))?;
        entry.report.status = status;
        entry.report.anomaly_label = Some(label.to_string());
        entry.report.anomaly_snapshot = Some(snapshot.to_vec());
        entry.updates += 1;
        Ok(())
    }

    fn update_status(&self, report_id: &str, status: ReportStatus) -> Result<()> {
        let mut entries = self.entries()?;
        let entry = entries
            .get_mut(report_id)
            .ok_or_else(|| PipelineError::ReportVanished(report_id.to_string()))?;
        entry.report.status = status;
        entry.updates += 1;
        Ok(())
    }
}
