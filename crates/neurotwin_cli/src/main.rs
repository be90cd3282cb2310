use anyhow::Context;
use clap::Parser;
use neurotwin_controllers::{DomainControllers, DomainSources};
use neurotwin_core::{NeuroTwinConfig, PatientId};
use neurotwin_sources::{activity_signal_from_config, SyntheticSource, UnavailableSource};
use neurotwin_sync::{Collaborators, SyncOrchestrator};
use neurotwin_visual::{TracingErrorSink, VisualizationCoordinator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file (missing file means defaults)
    #[arg(short, long, default_value = "neurotwin.toml")]
    config: PathBuf,

    /// Patient to mount
    #[arg(short, long, env = "NEUROTWIN_PATIENT")]
    patient: String,

    /// How long to keep polling before exiting
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Interval between status lines
    #[arg(long, default_value_t = 1000)]
    report_every_ms: u64,

    /// Write the final visualization state as JSON to this path
    #[arg(long)]
    export: Option<PathBuf>,

    /// Replace every data source with an unavailable stub
    #[arg(long)]
    offline: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Also write daily-rolling log files into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Logs go to stderr, or to a rolling file when `log_dir` is set. The
/// returned guard must live until exit so buffered lines are flushed.
fn init_tracing(args: &Args) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "neurotwin.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
    guard
}

fn build_sources(args: &Args, config: &NeuroTwinConfig) -> (DomainSources, Arc<SyntheticSource>) {
    let synthetic = Arc::new(SyntheticSource::new(&config.sources));
    let sources = if args.offline {
        DomainSources::from_shared(Arc::new(UnavailableSource::offline("offline mode")))
    } else {
        DomainSources::from_shared(Arc::clone(&synthetic))
    };
    (sources, synthetic)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_tracing(&args);

    let config = NeuroTwinConfig::load_or_default(&args.config);
    info!(
        config = %args.config.display(),
        commit_policy = ?config.controllers.commit_policy,
        offline = args.offline,
        "Starting NeuroTwin"
    );

    let (sources, probe) = build_sources(&args, &config);
    let controllers = DomainControllers::new(sources, &config);
    let collaborators = Collaborators {
        performance: probe,
        activity: activity_signal_from_config(&config.correlation),
    };

    let patient = PatientId::new(args.patient.trim());
    let orchestrator = Arc::new(
        SyncOrchestrator::mount(patient, config, controllers.clone(), collaborators).await,
    );
    let coordinator = VisualizationCoordinator::new(
        Arc::clone(&orchestrator),
        controllers,
        Arc::new(TracingErrorSink),
    );

    let deadline = tokio::time::sleep(Duration::from_secs(args.duration_secs));
    tokio::pin!(deadline);
    let mut report = tokio::time::interval(Duration::from_millis(args.report_every_ms.max(1)));
    report.tick().await;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = report.tick() => {
                info!("{}", coordinator.snapshot().await.summary());
            }
        }
    }

    orchestrator.shutdown();
    let final_view = coordinator.snapshot().await;
    println!("{}", final_view.summary());

    if let Some(path) = &args.export {
        coordinator
            .write_snapshot(path)
            .await
            .with_context(|| format!("Export to {} failed", path.display()))?;
        println!("Exported visualization state to {}", path.display());
    }

    Ok(())
}
