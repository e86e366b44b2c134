// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `split`   — load records, write the stratified split
//   2. `train`   — train one model, evaluate on the test split
//   3. `compare` — train several models on one split, rank them
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{resolve, Commands, CompareArgs, SplitArgs, TrainArgs};

use crate::application::compare_use_case::{ComparisonReport, CompareUseCase};
use crate::application::split_use_case::SplitUseCase;
use crate::application::train_use_case::TrainUseCase;
use crate::domain::split::SplitName;
use crate::ml::trainer::StopSignal;

#[derive(Parser, Debug)]
#[command(
    name = "hand-sign-trainer",
    version,
    about = "Split hand-landmark data, train sign classifiers and compare them."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Split(args)   => run_split(args),
            Commands::Train(args)   => run_train(args),
            Commands::Compare(args) => run_compare(args),
        }
    }
}

/// Ctrl-C raises the returned signal. The partial epoch is dropped
/// but the best checkpoint so far is kept.
fn interrupt_signal() -> Result<StopSignal> {
    let stop = StopSignal::new();
    let handler = stop.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("Interrupt received, stopping after the current batch");
        handler.raise();
    })
    .context("Cannot install the Ctrl-C handler")?;
    Ok(stop)
}

fn run_split(args: SplitArgs) -> Result<()> {
    let cfg = args.data.run_config()?;
    cfg.validate()?;
    let prepared = SplitUseCase::new(args.data.data_options(&cfg), cfg.split, &args.data.out_dir)
        .execute()?;

    let meta = &prepared.metadata;
    println!("\n{} samples, {} classes, {} features ({})",
        meta.total_samples, meta.num_classes, meta.num_features, meta.modality);
    for name in SplitName::ALL {
        if let Some(s) = meta.splits.get(&name) {
            println!("  {:<5} {:>6}", name.as_str(), s.samples);
        }
    }
    if meta.skipped_records > 0 {
        println!("  skipped {} unusable records", meta.skipped_records);
    }
    println!("Metadata: {}", prepared.metadata_path.display());
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    let (data, cfg) = resolve(&args.data, &args.training)?;
    tracing::info!("Training '{}' on data in '{}'", args.model, data.data_dir.display());

    let run = TrainUseCase::new(data, cfg, &args.data.out_dir, args.model)
        .with_stop_signal(interrupt_signal()?)
        .execute()?;

    let r = &run.result;
    println!("\nModel:         {}", r.identity);
    println!("Parameters:    {}", r.parameter_count);
    println!("Stopped:       {} after {} epochs", r.stop_reason, r.epochs_trained);
    println!("Best val acc:  {:.2}% (epoch {})",
        r.best_val_metric * 100.0,
        r.best_epoch.map_or("-".to_string(), |e| e.to_string()));
    println!("Test acc:      {:.2}%", r.test_metric * 100.0);

    let weakest = run
        .evaluation
        .per_class
        .iter()
        .min_by(|a, b| a.1.accuracy.total_cmp(&b.1.accuracy));
    if let Some((class, acc)) = weakest {
        println!("Weakest class: '{}' {:.2}% ({}/{})", class, acc.accuracy * 100.0, acc.correct, acc.total);
    }
    Ok(())
}

fn run_compare(args: CompareArgs) -> Result<()> {
    let (data, cfg) = resolve(&args.data, &args.training)?;
    let report = CompareUseCase::new(data, cfg, &args.data.out_dir, args.models)
        .with_stop_signal(interrupt_signal()?)
        .execute()?;
    print_comparison(&report);
    Ok(())
}

fn print_comparison(report: &ComparisonReport) {
    println!("\n{:<4} {:<14} {:>9} {:>9} {:>11} {:>7}  stop",
        "rank", "model", "test_acc", "val_acc", "params", "epochs");
    for (i, r) in report.ranked.iter().enumerate() {
        println!("{:<4} {:<14} {:>8.2}% {:>8.2}% {:>11} {:>7}  {}",
            i + 1, r.identity, r.test_metric * 100.0, r.best_val_metric * 100.0,
            r.parameter_count, r.epochs_trained, r.stop_reason);
    }
    for f in &report.failed {
        println!("FAILED {:<14} {}", f.identity, f.reason);
    }
    if report.skipped_records > 0 {
        println!("Skipped {} unusable records while loading", report.skipped_records);
    }
    if let Some(best) = report.winner() {
        println!("\nBest model: {} ({:.2}% test accuracy)", best.identity, best.test_metric * 100.0);
    }
}
