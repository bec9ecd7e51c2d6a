use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use medscreen::artifacts::OutputLayout;
use medscreen::config::RunConfig;
use medscreen::data::{CohortSource, TableSource};
use medscreen::logging::init_tracing;
use medscreen::pipeline::{Runner, ScreenPlan, read_worklist, run_stage1, run_total_effect};
use medscreen::qc::check_index;
use medscreen::reconcile::{aggregate, manifest, reconcile, write_manifest};
use medscreen::shard::WorkItem;
use medscreen::types::{ScreenKind, Stratum};

#[derive(Parser)]
#[command(name = "medscreen")]
#[command(about = "Two-stage protein mediation screen", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    threads: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stage 1 for one factor.
    Screen {
        #[arg(long)]
        stratum: Stratum,
        #[arg(long)]
        factor_index: usize,
    },
    /// Every work item owned by one shard.
    Shard {
        #[arg(long)]
        stratum: Stratum,
        #[arg(long)]
        shard: usize,
        #[arg(long, default_value = "factor")]
        screen: ScreenKind,
    },
    /// A single grid cell.
    Pair {
        #[arg(long)]
        stratum: Stratum,
        #[arg(long)]
        row: usize,
        #[arg(long)]
        outcome: usize,
        #[arg(long, default_value = "factor")]
        screen: ScreenKind,
    },
    Plan {
        #[arg(long)]
        stratum: Stratum,
        #[arg(long, default_value = "factor")]
        screen: ScreenKind,
    },
    TotalEffect {
        #[arg(long)]
        stratum: Stratum,
        #[arg(long)]
        factor_index: usize,
    },
    Reconcile {
        #[arg(long)]
        stratum: Stratum,
        #[arg(long, default_value = "factor")]
        screen: ScreenKind,
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    Rerun {
        #[arg(long)]
        stratum: Stratum,
        #[arg(long)]
        worklist: PathBuf,
        #[arg(long, default_value = "factor")]
        screen: ScreenKind,
    },
    Aggregate {
        #[arg(long)]
        stratum: Stratum,
        #[arg(long, default_value = "factor")]
        screen: ScreenKind,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<RunConfig> {
    let mut config = RunConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if cli.threads.is_some() {
        config.threads = cli.threads;
    }
    config.validate()?;
    Ok(config)
}

fn build_plan(
    source: &TableSource,
    config: &RunConfig,
    screen: ScreenKind,
    stratum: Stratum,
) -> anyhow::Result<ScreenPlan> {
    let catalog = source.catalog()?;
    let variants = match screen {
        ScreenKind::Genotype => source.variant_candidates()?,
        ScreenKind::Factor => Vec::new(),
    };
    ScreenPlan::build(screen, stratum, &catalog, &variants, config)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let source = TableSource::new(&config.data_dir);
    let layout = OutputLayout::new(&config.output_dir);

    match cli.command {
        Command::Screen {
            stratum,
            factor_index,
        } => {
            let plan = build_plan(&source, &config, ScreenKind::Factor, stratum)?;
            let row = check_index(factor_index, plan.rows.len(), "factor index")?;
            let data = source.stratum(stratum)?;
            let factor_id = &plan.rows[row].label;
            let records = run_stage1(&data, factor_id, &config, &layout)?;
            let passed = medscreen::filter::filter_candidates(&records, config.gate());
            tracing::info!(
                "{factor_id} ({stratum}): {} of {} mediators pass",
                passed.len(),
                records.len()
            );
        }
        Command::Shard {
            stratum,
            shard,
            screen,
        } => {
            let plan = build_plan(&source, &config, screen, stratum)?;
            let data = source.stratum(stratum)?;
            let mut runner = Runner::new(&config, &layout, &data, &plan, &format!("shard{shard}"))?;
            runner.run_shard(shard)?;
        }
        Command::Pair {
            stratum,
            row,
            outcome,
            screen,
        } => {
            let plan = build_plan(&source, &config, screen, stratum)?;
            let item = WorkItem {
                row: check_index(row, plan.sharder.rows(), "row")?,
                outcome: check_index(outcome, plan.sharder.outcomes(), "outcome")?,
            };
            let data = source.stratum(stratum)?;
            let mut runner =
                Runner::new(&config, &layout, &data, &plan, &format!("pair{row}_{outcome}"))?;
            runner.run_item(item)?;
        }
        Command::Plan { stratum, screen } => {
            let plan = build_plan(&source, &config, screen, stratum)?;
            println!("{}", plan.summary());
            println!("rows\t{}", plan.sharder.rows());
            println!("outcomes\t{}", plan.sharder.outcomes());
            println!("grid\t{}", plan.sharder.grid_size());
            println!("width\t{}", plan.sharder.width());
            println!("shards\t{}", plan.sharder.shard_count());
        }
        Command::TotalEffect {
            stratum,
            factor_index,
        } => {
            let plan = build_plan(&source, &config, ScreenKind::Factor, stratum)?;
            let row = check_index(factor_index, plan.rows.len(), "factor index")?;
            let data = source.stratum(stratum)?;
            run_total_effect(&data, &plan.rows[row].label, &plan.outcomes, &config, &layout)?;
        }
        Command::Reconcile {
            stratum,
            screen,
            manifest: manifest_path,
        } => {
            let plan = build_plan(&source, &config, screen, stratum)?;
            let report = reconcile(&plan, &layout, config.gate())?;
            println!(
                "{}\t{} outstanding of {} expected",
                layout.worklist(screen, stratum).display(),
                report.outstanding.len(),
                report.expected
            );
            if let Some(path) = manifest_path {
                let rows = manifest(&plan, &layout);
                write_manifest(&plan, &rows, &path)
                    .with_context(|| format!("write manifest {}", path.display()))?;
            }
        }
        Command::Rerun {
            stratum,
            worklist,
            screen,
        } => {
            let plan = build_plan(&source, &config, screen, stratum)?;
            let items = read_worklist(&worklist)?;
            let data = source.stratum(stratum)?;
            let mut runner = Runner::new(&config, &layout, &data, &plan, "rerun")?;
            runner.rerun(&items)?;
        }
        Command::Aggregate { stratum, screen } => {
            let plan = build_plan(&source, &config, screen, stratum)?;
            let summary = aggregate(&plan, &layout)?;
            println!(
                "{}\t{} rows from {} artifacts",
                layout.aggregate(screen, stratum).display(),
                summary.rows,
                summary.artifacts
            );
        }
    }
    Ok(())
}
