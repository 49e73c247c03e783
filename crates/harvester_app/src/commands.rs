use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use engine_logging::{engine_info, engine_warn};
use harvester_core::DiagnosticSwitches;
use harvester_engine::{
    Fetcher, HarvestEngine, JsonDirStore, ProgressStore, ReqwestFetcher, StaticHtmlDriver,
};

use crate::config::AppConfig;
use crate::events::LogSink;

pub async fn run(config: AppConfig, job_dir: Option<&Path>) -> anyhow::Result<()> {
    let mut engine = build_engine(config, job_dir).await?;

    let token = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("Ctrl-C received, stopping after the current step");
            token.cancel();
        }
    });

    let summary = engine.run().await.context("harvest aborted")?;
    println!(
        "{} page(s), {} saved, {} skipped, {} unresolved",
        summary.pages_processed,
        summary.items_saved,
        summary.items_skipped,
        summary.items_unresolved
    );
    if summary.stopped {
        println!("stopped early; run again to resume");
    } else if summary.finished {
        println!("finished");
    }
    if !summary.rework_pages.is_empty() {
        println!("pages to rework: {:?}", summary.rework_pages);
    }
    Ok(())
}

pub async fn diagnose(config: AppConfig, job_dir: Option<&Path>, all: bool) -> anyhow::Result<()> {
    let switches = if all {
        DiagnosticSwitches::all()
    } else {
        config.job.diagnostics
    };
    if !switches.any() {
        bail!("no diagnostics selected: enable some under `diagnostics` or pass --all");
    }
    let mut engine = build_engine(config, job_dir).await?;
    let report = engine.diagnose(switches).await.context("diagnostic run failed")?;
    println!("{report:#?}");
    Ok(())
}

pub fn status(config: &AppConfig, job_dir: Option<&Path>) -> anyhow::Result<()> {
    print!("{}", status_report(config, job_dir)?);
    Ok(())
}

pub fn check(config: &AppConfig, job_dir: Option<&Path>) -> anyhow::Result<()> {
    println!(
        "configuration ok: start at {}, job directory {}",
        config.start_url,
        config.job_dir(job_dir).display()
    );
    Ok(())
}

async fn build_engine(config: AppConfig, job_dir: Option<&Path>) -> anyhow::Result<HarvestEngine> {
    let dir = config.job_dir(job_dir);
    let records = config.records_dir(job_dir);
    engine_info!("Job directory {:?}, records in {:?}", dir, records);

    let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(config.fetch.clone()));
    let driver = StaticHtmlDriver::open(fetcher.clone(), config.start_url.clone())
        .await
        .with_context(|| format!("cannot open {}", config.start_url))?;
    let engine = HarvestEngine::new(
        config.job,
        Box::new(driver),
        Arc::new(JsonDirStore::new(records)),
        ProgressStore::new(dir),
    )?
    .with_fetcher(fetcher)
    .with_sink(Arc::new(LogSink));
    Ok(engine)
}

fn status_report(config: &AppConfig, job_dir: Option<&Path>) -> anyhow::Result<String> {
    let dir = config.job_dir(job_dir);
    let view = ProgressStore::new(&dir).load()?.view();
    let records = count_records(&config.records_dir(job_dir));

    let mut out = String::new();
    writeln!(out, "job directory:  {}", dir.display())?;
    writeln!(out, "resume page:    {}", view.current_page)?;
    match view.total_pages {
        0 => writeln!(out, "page count:     unknown")?,
        total => writeln!(out, "page count:     {total}")?,
    }
    writeln!(out, "progress:       {view}")?;
    writeln!(out, "finished:       {}", view.finished)?;
    writeln!(out, "records:        {records}")?;
    writeln!(out, "rework pages:   {:?}", view.rework_pages)?;
    if view.consecutive_all_fail_pages > 0 {
        writeln!(
            out,
            "failing streak: {} page(s)",
            view.consecutive_all_fail_pages
        )?;
    }
    Ok(out)
}

fn count_records(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
                .count()
        })
        .unwrap_or(0)
}
