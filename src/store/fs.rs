use super::{MediaStore, ReportRepository};
use crate::error::{PipelineError, Result};
use crate::model::{Report, ReportStatus};
use crate::util::ensure_dir;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MediaStore for FsMediaStore {
    fn get_blob(&self, media_id: &str) -> Result<Vec<u8>> {
        validate_id(media_id)?;
        let path = self.root.join(media_id);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PipelineError::BlobMissing(media_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug)]
pub struct FsReportRepository {
    root: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FsReportRepository {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure_dir(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn record_path(&self, report_id: &str) -> PathBuf {
        self.root.join(format!("{report_id}.json"))
    }

    fn snapshot_path(&self, report_id: &str) -> PathBuf {
        self.root.join(format!("{report_id}.snapshot.jpg"))
    }

    pub fn insert(&self, report: &Report) -> Result<()> {
        validate_id(&report.id)?;
        let _guard = self.lock()?;
        if let Some(snapshot) = &report.anomaly_snapshot {
            write_atomic(&self.snapshot_path(&report.id), snapshot)?;
        }
        write_atomic(
            &self.record_path(&report.id),
            &serde_json::to_vec_pretty(report)?,
        )
    }

    pub fn list_processing(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(report) = self.load(id)? {
                if report.status == ReportStatus::Processing {
                    ids.push(report.id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| PipelineError::Storage("report repository lock poisoned".into()))
    }

    fn read_record(&self, report_id: &str) -> Result<Option<Report>> {
        let raw = match std::fs::read(self.record_path(report_id)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let report: Report = serde_json::from_slice(&raw)?;
        Ok(Some(report))
    }

    fn modify(&self, report_id: &str, f: impl FnOnce(&mut Report)) -> Result<Report> {
        validate_id(report_id)?;
        let mut report = self
            .read_record(report_id)?
            .ok_or_else(|| PipelineError::ReportVanished(report_id.to_string()))?;
        f(&mut report);
        write_atomic(
            &self.record_path(report_id),
            &serde_json::to_vec_pretty(&report)?,
        )?;
        Ok(report)
    }
}

impl ReportRepository for FsReportRepository {
    fn exists(&self, report_id: &str) -> Result<bool> {
        validate_id(report_id)?;
        Ok(self.record_path(report_id).is_file())
    }

    fn load(&self, report_id: &str) -> Result<Option<Report>> {
        validate_id(report_id)?;
        let Some(mut report) = self.read_record(report_id)? else {
            return Ok(None);
        };
        match std::fs::read(self.snapshot_path(report_id)) {
            Ok(bytes) => report.anomaly_snapshot = Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Some(report))
    }

    fn update_status_and_anomaly(
        &self,
        report_id: &str,
        status: ReportStatus,
        label: &str,
        snapshot: &[u8],
    ) -> Result<()> {
        validate_id(report_id)?;
        let _guard = self.lock()?;
        if !self.record_path(report_id).is_file() {
            return Err(PipelineError::ReportVanished(report_id.to_string()));
        }
        // Snapshot first: a record that names a label always has its image.
        write_atomic(&self.snapshot_path(report_id), snapshot)?;
        self.modify(report_id, |r| {
            r.status = status;
            r.anomaly_label = Some(label.to_string());
        })?;
        debug!(report_id, %status, label, "report updated");
        Ok(())
    }

    fn update_status(&self, report_id: &str, status: ReportStatus) -> Result<()> {
        let _guard = self.lock()?;
        self.modify(report_id, |r| r.status = status)?;
        debug!(report_id, %status, "report status updated");
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
    std::fs::write(&tmp, bytes)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn validate_id(id: &str) -> Result<()> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains('/')
        || id.contains('\\')
        || id.contains('\0');
    if bad {
        return Err(PipelineError::Storage(format!("invalid identifier: {id:?}")));
    }
    Ok(())
}
