use crate::{
    aggregate::aggregate,
    classify::MediaClassifier,
    config::Config,
    detector::Detector,
    error::{ErrorKind, PipelineError, Result},
    model::{DetectionResult, MediaKind, MediaReference, Report, ReportStatus},
    report::JobReport,
    retry::RetryPolicy,
    sampler::FrameSampler,
    scratch::{ScratchDir, ScratchSet, annotated_path},
    store::{MediaStore, ReportRepository},
    video::FrameSource,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobOutcome {
    Classified(JobReport),
    Vanished,
    Failed { kind: ErrorKind, message: String },
}

pub struct Pipeline {
    cfg: Config,
    media: Arc<dyn MediaStore>,
    reports: Arc<dyn ReportRepository>,
    frames: Arc<dyn FrameSource>,
    classifier: MediaClassifier,
    scratch: ScratchDir,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        cfg: &Config,
        media: Arc<dyn MediaStore>,
        reports: Arc<dyn ReportRepository>,
        detector: Arc<dyn Detector>,
        frames: Arc<dyn FrameSource>,
    ) -> Result<Self> {
        Ok(Self {
            cfg: cfg.clone(),
            media,
            reports,
            frames,
            classifier: MediaClassifier::new(detector, cfg.detector.class_names.clone()),
            scratch: ScratchDir::new(&cfg.paths.scratch_dir)?,
            retry: RetryPolicy::from_config(cfg),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn classifier(&self) -> &MediaClassifier {
        &self.classifier
    }

    pub fn classify_report(&self, report: &Report) {
        if let Err(err) = self.run_job(report) {
            error!(report_id = %report.id, kind = ?err.kind(), "classification job failed: {err}");
        }
    }

    /// Runs the job under the retry policy. `Err` only comes back when the
    /// policy re-raises or the error kind is not one it catches; the report is
    /// marked `Error` either way.
    pub fn run_job(&self, report: &Report) -> Result<JobOutcome> {
        let span = info_span!("report", report_id = %report.id);
        let _enter = span.enter();
        let started = Instant::now();

        match self.reports.exists(&report.id) {
            Ok(true) => {}
            Ok(false) => {
                info!("report no longer exists; skipping");
                return Ok(JobOutcome::Vanished);
            }
            Err(err) => return self.fail(report, err),
        }

        info!(media = report.media.len(), "classification started");

        let mut attempts = 0u32;
        let result = self.retry.run("classify_report", |attempt| {
            attempts = attempt + 1;
            self.attempt(report, started)
        });

        match result {
            Ok(mut job) => {
                job.attempts = attempts;
                job.elapsed_ms = started.elapsed().as_millis() as u64;
                info!(
                    label = %job.label,
                    confidence = job.confidence,
                    attempts,
                    elapsed_ms = job.elapsed_ms,
                    "classification finished"
                );
                Ok(JobOutcome::Classified(job))
            }
            Err(err) => self.fail(report, err),
        }
    }

    pub fn mark_error(&self, report_id: &str) {
        if !self.cfg.job.mark_error_on_failure {
            return;
        }
        match self.reports.update_status(report_id, ReportStatus::Error) {
            Ok(()) => warn!(report_id, "report marked Error"),
            Err(e) => error!(report_id, "could not mark report Error: {e}"),
        }
    }

    fn fail(&self, report: &Report, err: PipelineError) -> Result<JobOutcome> {
        if err.kind() == ErrorKind::ReportVanished {
            info!("report vanished during classification");
            return Ok(JobOutcome::Vanished);
        }

        warn!(kind = ?err.kind(), "classification failed: {err}");
        self.mark_error(&report.id);

        if self.retry.raise_on_exhaustion || !self.retry.catches(&err) {
            return Err(err);
        }
        Ok(JobOutcome::Failed {
            kind: err.kind(),
            message: err.to_string(),
        })
    }

    fn attempt(&self, report: &Report, started: Instant) -> Result<JobReport> {
        let mut scratch = ScratchSet::default();
        let result = self.classify_and_persist(report, started, &mut scratch);
        let tracked = scratch.len();
        let removed = scratch.remove_all();
        debug!(tracked, removed, "scratch cleanup");
        result
    }

    fn classify_and_persist(
        &self,
        report: &Report,
        started: Instant,
        scratch: &mut ScratchSet,
    ) -> Result<JobReport> {
        let mut results: Vec<DetectionResult> = Vec::new();

        for media in &report.media {
            self.check_deadline(started)?;
            self.classify_media(media, started, scratch, &mut results)?;
        }

        let outcome = aggregate(&report.id, &results, &self.cfg.job.no_detection_label)?;
        let snapshot = std::fs::read(&outcome.snapshot_path)?;

        self.reports.update_status_and_anomaly(
            &report.id,
            ReportStatus::Pending,
            &outcome.label,
            &snapshot,
        )?;

        Ok(JobReport::new(
            &report.id,
            &outcome,
            &results,
            report.media.len(),
            &snapshot,
        ))
    }

    fn classify_media(
        &self,
        media: &MediaReference,
        started: Instant,
        scratch: &mut ScratchSet,
        results: &mut Vec<DetectionResult>,
    ) -> Result<()> {
        let path = {
            let bytes = self.media.get_blob(&media.media_id)?;
            self.scratch.write_blob(media, &bytes)?
        };
        scratch.track(&path);

        match media.media_kind {
            MediaKind::Image => {
                let annotated = annotated_path(&path);
                scratch.track(&annotated);
                let classification = self.classifier.classify(&path, &annotated)?;
                let result = DetectionResult::new(
                    &media.media_id,
                    path,
                    classification.as_ref().map(|_| annotated),
                    classification.as_ref(),
                );
                debug!(
                    media_id = %media.media_id,
                    label = ?result.label,
                    confidence = result.confidence,
                    "image classified"
                );
                results.push(result);
            }
            MediaKind::Video => {
                let sampler = FrameSampler::new(
                    self.frames.as_ref(),
                    &self.classifier,
                    self.cfg.video.max_frames,
                );
                for result in sampler.sample(&media.media_id, &path)? {
                    for artifact in result.artifacts() {
                        scratch.track(artifact);
                    }
                    debug!(
                        media_id = %media.media_id,
                        frame_index = ?result.frame_index,
                        label = ?result.label,
                        confidence = result.confidence,
                        "frame classified"
                    );
                    results.push(result);
                    self.check_deadline(started)?;
                }
            }
        }
        Ok(())
    }

    fn check_deadline(&self, started: Instant) -> Result<()> {
        let limit = self.cfg.job.timeout_seconds;
        if limit > 0 && started.elapsed() > Duration::from_secs(limit) {
            return Err(PipelineError::Timeout {
                operation: "classify_report".to_string(),
                seconds: limit,
            });
        }
        Ok(())
    }
}
