pub mod fs;
pub mod memory;

use crate::error::Result;
use crate::model::{Report, ReportStatus};

pub use fs::{FsMediaStore, FsReportRepository};
pub use memory::{MemoryMediaStore, MemoryReportRepository};

pub trait MediaStore: Send + Sync {
    fn get_blob(&self, media_id: &str) -> Result<Vec<u8>>;
}

pub trait ReportRepository: Send + Sync {
    fn exists(&self, report_id: &str) -> Result<bool>;

    fn load(&self, report_id: &str) -> Result<Option<Report>>;

    /// Writes `status`, `anomaly_label` and `anomaly_snapshot` together and
    /// nothing else. `ReportVanished` if the report is gone.
    fn update_status_and_anomaly(
        &self,
        report_id: &str,
        status: ReportStatus,
        label: &str,
        snapshot: &[u8],
    ) -> Result<()>;

    fn update_status(&self, report_id: &str, status: ReportStatus) -> Result<()>;
}
