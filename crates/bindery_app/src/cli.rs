use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bindery_core::JobDescription;
use bindery_engine::{
    AtomicFileWriter, ChannelNotifier, EngineHandle, FanoutNotifier, LogNotifier, StatusPayload,
    StatusUpdate,
};
use bindery_logging::{bindery_error, bindery_info, LogDestination};
use clap::Parser;
use tokio::runtime::Handle;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "bindery")]
#[command(about = "Bundle comic chapter images into a CBZ archive or a PDF")]
pub struct Args {
    /// Job descriptions (JSON), one per file.
    #[arg(required = true)]
    pub jobs: Vec<PathBuf>,

    /// Path to a RON config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory finished artifacts are written to. Overrides the config.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Log level (trace/debug/info/warn/error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Also write the log to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

pub fn dispatch(args: Args) -> Result<()> {
    let app_config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    init_logging(&args)?;

    let out_dir = args
        .out
        .clone()
        .or_else(|| app_config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;
    runtime.block_on(run(&args.jobs, &app_config, &out_dir))
}

fn init_logging(args: &Args) -> Result<()> {
    let Some(level) = bindery_logging::parse_level(&args.log_level) else {
        bail!("unknown log level {:?}", args.log_level);
    };
    let destination = match &args.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    bindery_logging::initialize(destination, level);
    Ok(())
}

async fn run(jobs: &[PathBuf], app_config: &AppConfig, out_dir: &Path) -> Result<()> {
    let (channel, mut updates) = ChannelNotifier::channel();
    let notifier = FanoutNotifier::new(vec![Box::new(LogNotifier), Box::new(channel)]);
    let engine = EngineHandle::new(
        app_config.engine_config(),
        Arc::new(notifier),
        Handle::current(),
    );

    let mut accepted = 0usize;
    for path in jobs {
        let job = read_job(path)?;
        let response = engine.submit(job);
        println!("{}", serde_json::to_string(&response)?);
        if response.accepted {
            accepted += 1;
        }
    }

    engine.wait_idle().await;

    let writer = AtomicFileWriter::new(out_dir.to_path_buf());
    let mut failed = 0usize;
    while let Ok(update) = updates.try_recv() {
        if !update.is_terminal() {
            continue;
        }
        println!("{}", serde_json::to_string(&update)?);
        if let Err(err) = collect(&engine, &writer, &update) {
            bindery_error!("Job {}: {:#}", update.job_id, err);
            failed += 1;
        }
    }

    let health = engine.health();
    bindery_info!(
        "Done: {} accepted, {} failed, {} artifacts left, rss {:?}",
        accepted,
        failed,
        health.stored_artifacts,
        health.resident_memory_bytes
    );

    if failed > 0 || accepted < jobs.len() {
        bail!("{} of {} jobs did not produce output", jobs.len() - accepted + failed, jobs.len());
    }
    Ok(())
}

fn read_job(path: &Path) -> Result<JobDescription> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading job {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing job {}", path.display()))
}

/// Write a completed job's artifact to disk. Failed jobs are reported as errors.
fn collect(engine: &EngineHandle, writer: &AtomicFileWriter, update: &StatusUpdate) -> Result<()> {
    let token = match &update.payload {
        StatusPayload::Completed { token, .. } => token,
        StatusPayload::Failed { error } => bail!("{error}"),
        StatusPayload::Started {} => return Ok(()),
    };

    let artifact = engine.take_artifact(token)?;
    let mut reader = artifact.payload.reader()?;
    let (path, written) = writer.write_from(&artifact.meta.filename, &mut reader)?;
    bindery_info!("Wrote {} ({} bytes)", path.display(), written);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_jobs_and_overrides() {
        let args = Args::try_parse_from([
            "bindery",
            "--out",
            "/tmp/out",
            "--log-level",
            "debug",
            "a.json",
            "b.json",
        ])
        .unwrap();
        assert_eq!(args.jobs, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert_eq!(args.out, Some(PathBuf::from("/tmp/out")));
        assert_eq!(args.log_level, "debug");
        assert!(args.config.is_none());
    }

    #[test]
    fn at_least_one_job_is_required() {
        assert!(Args::try_parse_from(["bindery"]).is_err());
    }

    #[test]
    fn read_job_reports_the_file_on_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(&path, "{ not json").unwrap();

        let err = read_job(&path).unwrap_err();
        assert!(format!("{err:#}").contains("job.json"));
    }
}
