use crate::{
    classify::MediaClassifier,
    config::Config,
    detector::{Detector, python::PythonDetector},
    dispatcher::JobDispatcher,
    model::Report,
    pipeline::Pipeline,
    sampler::FramePlan,
    scratch::annotated_path,
    store::{FsMediaStore, FsReportRepository, ReportRepository},
    util::{ensure_dir, now_rfc3339},
    video::{FfmpegFrameSource, FrameSource},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "roadscan")]
#[command(about = "Road-anomaly report classifier (frame sampling + detection + aggregation)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./roadscan.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Doctor {},
    Detect {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        annotated: Option<PathBuf>,
    },
    Plan {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        max_frames: Option<usize>,
    },
    Process { report_ids: Vec<String> },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
    info!("config={}", cfg_path.display());

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Detect { input, annotated } => detect(&cfg, input, annotated.as_deref()),
        Command::Plan { input, max_frames } => plan(&cfg, input, *max_frames),
        Command::Process { report_ids } => process(&cfg, report_ids),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("roadscan.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("roadscan.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("roadscan.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    let detector = PythonDetector::new(cfg)?;
    let diag = detector.doctor()?;

    let tools: Vec<serde_json::Value> = FfmpegFrameSource::new(cfg)
        .versions()
        .into_iter()
        .map(|(exe, res)| match res {
            Ok(version) => serde_json::json!({"exe": exe, "ok": true, "version": version}),
            Err(error) => serde_json::json!({"exe": exe, "ok": false, "error": error}),
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "detector": diag,
            "video_tools": tools,
        }))?
    );
    Ok(())
}

fn detect(cfg: &Config, input: &Path, annotated: Option<&Path>) -> Result<()> {
    if !input.is_file() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }
    let annotated = annotated
        .map(PathBuf::from)
        .unwrap_or_else(|| annotated_path(input));

    let detector: Arc<dyn Detector> = Arc::new(PythonDetector::new(cfg)?);
    let classifier = MediaClassifier::new(detector, cfg.detector.class_names.clone());
    let classification = classifier
        .classify(input, &annotated)
        .with_context(|| format!("classifying {}", input.display()))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "annotated": annotated,
            "classification": classification,
        }))?
    );
    Ok(())
}

fn plan(cfg: &Config, input: &Path, max_frames: Option<usize>) -> Result<()> {
    let frames = FfmpegFrameSource::new(cfg);
    let info = frames
        .probe(input)
        .with_context(|| format!("probing {}", input.display()))?;
    let plan = FramePlan::new(info.total_frames, max_frames.unwrap_or(cfg.video.max_frames));

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "video": info,
            "duration_secs": info.duration_secs(),
            "plan": plan,
            "sampled": plan.sampled(),
        }))?
    );
    Ok(())
}

fn process(cfg: &Config, requested: &[String]) -> Result<()> {
    let reports = Arc::new(
        FsReportRepository::new(&cfg.paths.reports_dir)
            .with_context(|| format!("opening reports_dir: {}", cfg.paths.reports_dir))?,
    );
    let media = Arc::new(FsMediaStore::new(&cfg.paths.media_dir));

    let ids = if requested.is_empty() {
        reports.list_processing()?
    } else {
        requested.to_vec()
    };

    let mut queued: Vec<Report> = Vec::new();
    for id in &ids {
        match reports.load(id)? {
            Some(report) => queued.push(report),
            None => warn!(report_id = %id, "report not found; skipping"),
        }
    }

    let out_dir = PathBuf::from(&cfg.paths.out_dir);
    ensure_dir(&out_dir)?;
    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(out_dir.join("effective-config.toml"), raw)?;
    }

    let detector: Arc<dyn Detector> = Arc::new(PythonDetector::new(cfg)?);
    let frames: Arc<dyn FrameSource> = Arc::new(FfmpegFrameSource::new(cfg));
    let pipeline = Arc::new(Pipeline::new(
        cfg,
        media,
        Arc::clone(&reports) as Arc<dyn ReportRepository>,
        detector,
        frames,
    )?);

    let started = now_rfc3339();
    info!(reports = queued.len(), "processing reports");

    let dispatcher = JobDispatcher::start(&cfg.dispatcher, pipeline)?;
    for report in &queued {
        dispatcher.launch_blocking(report.clone())?;
    }
    let stats = dispatcher.shutdown();

    let mut entries = Vec::new();
    for report in &queued {
        let entry = match reports.load(&report.id)? {
            Some(r) => serde_json::json!({
                "report_id": r.id,
                "status": r.status,
                "anomaly_label": r.anomaly_label,
                "snapshot_bytes": r.anomaly_snapshot.as_ref().map(Vec::len),
            }),
            None => serde_json::json!({"report_id": report.id, "status": null}),
        };
        entries.push(entry);
    }

    let summary = serde_json::json!({
        "started": started,
        "finished": now_rfc3339(),
        "reports": entries,
        "stats": stats,
    });
    std::fs::write(
        out_dir.join("summary.json"),
        serde_json::to_string_pretty(&summary)?,
    )?;

    if cfg.global.print_summary {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}
