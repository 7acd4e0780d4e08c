//! The run command: read observations, run QC, export flags.

use super::shared::{OutputFiles, create_progress_bar, load_configuration, read_input, setup_logging};
use crate::cli::args::{ReportFormat, RunArgs};
use crate::engine::QcEngine;
use crate::export::write_updates;
use crate::models::QcReport;
use anyhow::{Context, Result};
use colored::*;
use indicatif::HumanDuration;
use std::time::Instant;
use tokio::task;
use tracing::{debug, info};

/// Outcome of a run command
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: QcReport,
    pub outputs: OutputFiles,
    pub elapsed: std::time::Duration,
}

pub async fn run_qc(args: RunArgs) -> Result<RunSummary> {
    let start = Instant::now();
    setup_logging(args.get_log_level(), args.quiet);
    args.validate()?;

    let mut config = load_configuration(args.config_file.as_ref())?;
    if args.history_path.is_some() {
        config.flag_history = true;
    }

    let mut table = read_input(&args.input)?;
    if args.reset_flags {
        info!("Resetting {} flags to no QC", table.height());
        QcEngine::reset_flags(&mut table)?;
    }

    let mut engine = QcEngine::new(config).context("Invalid QC configuration")?;
    let progress = args
        .show_progress()
        .then(|| create_progress_bar(engine.plan().len() as u64, "Running QC"));

    // the run is CPU-bound; keep it off the async workers
    let worker_progress = progress.clone();
    let (table, report) = task::spawn_blocking(move || {
        let report = engine.run_with_progress(&mut table, worker_progress.as_ref())?;
        Ok::<_, crate::QcError>((table, report))
    })
    .await
    .context("QC task terminated unexpectedly")??;

    if let Some(pb) = &progress {
        pb.finish_with_message("QC complete");
    }

    let mut outputs = OutputFiles::default();
    let written = write_updates(
        &args.output_path,
        &table.flag_updates()?,
        &report.feature_flags,
        args.format,
    )
    .with_context(|| format!("Failed to write flags to {}", args.output_path.display()))?;
    for path in written {
        outputs.record(path);
    }

    if let (Some(path), Some(history)) = (&args.history_path, &report.history) {
        history.write_json(path)?;
        debug!("Flag history for {} observations written", history.len());
        outputs.record(path.clone());
    }

    let summary = RunSummary {
        report,
        outputs,
        elapsed: start.elapsed(),
    };
    match args.report_format {
        ReportFormat::Human => print_human_report(&summary),
        ReportFormat::Json => print_json_report(&summary)?,
    }
    Ok(summary)
}

fn print_human_report(summary: &RunSummary) {
    let report = &summary.report;

    println!("\n{}", "QC run complete".bright_green().bold());
    println!(
        "  {} {}",
        "Observations:".bright_cyan(),
        report.rows.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Run time:".bright_cyan(),
        HumanDuration(summary.elapsed)
    );

    println!("\n{}", "Steps:".bright_yellow());
    for step in &report.steps {
        let fired = if step.fired > 0 {
            step.fired.to_string().bright_red().bold()
        } else {
            step.fired.to_string().normal()
        };
        println!(
            "  {:<32} {:>8} evaluated {:>8} fired {:>8} undetermined",
            step.label, step.evaluated, fired, step.undetermined
        );
    }

    println!("\n{}", "Flags:".bright_yellow());
    for (flag, count) in &report.flag_counts {
        println!("  {} {:<30} {}", flag.code(), flag.name(), count);
    }

    if !report.flagged_observation_types.is_empty() {
        println!(
            "\n{} {}",
            "Flagged observation types:".bright_red(),
            report.flagged_observation_types.join(", ")
        );
    }

    if !summary.outputs.files.is_empty() {
        println!("\n{}", "Output files:".bright_yellow());
        for (path, size) in &summary.outputs.files {
            println!(
                "  {} ({})",
                path.display(),
                OutputFiles::format_size(*size)
            );
        }
    }
    println!();
}

fn print_json_report(summary: &RunSummary) -> Result<()> {
    let report = &summary.report;
    let json = serde_json::json!({
        "rows": report.rows,
        "run_time_seconds": summary.elapsed.as_secs_f64(),
        "steps": report.steps.iter().map(|step| serde_json::json!({
            "label": step.label,
            "evaluated": step.evaluated,
            "fired": step.fired,
            "undetermined": step.undetermined,
            "seconds": step.elapsed.as_secs_f64(),
        })).collect::<Vec<_>>(),
        "flag_counts": report.flag_counts.iter().map(|(flag, count)| {
            (flag.code().to_string(), serde_json::Value::from(*count))
        }).collect::<serde_json::Map<_, _>>(),
        "flagged_observation_types": report.flagged_observation_types,
        "output_files": summary.outputs.files.iter().map(|(path, size)| serde_json::json!({
            "path": path.display().to_string(),
            "size_bytes": size,
        })).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
