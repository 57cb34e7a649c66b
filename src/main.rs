mod args;

use anyhow::{bail, Context};
use args::{ChukCliArgs, Subaction};
use chuk_grid::{check_with_options, export, io, mask, sample, CheckOptions, ChukGrid, LoadOptions};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    let args = ChukCliArgs::parse();
    match args.subcmd {
        Subaction::Check(cmd) => {
            let grid = ChukGrid::load(&cmd.grid)
                .with_context(|| format!("loading grid {}", cmd.grid))?;
            let ds = io::read(&cmd.input).with_context(|| format!("reading {}", cmd.input))?;
            let report = check_with_options(&ds, &grid, &CheckOptions::default());
            for issue in report.warnings.iter().chain(report.errors.iter()) {
                println!("{:?}: {issue}", issue.severity);
            }
            println!(
                "{} warning(s), {} error(s)",
                report.warnings.len(),
                report.errors.len()
            );
            if !report.errors.is_empty() {
                bail!("{} failed the CHUK checks", cmd.input);
            }
        }
        Subaction::Export(cmd) => {
            let grid = ChukGrid::load(&cmd.grid)
                .with_context(|| format!("loading grid {}", cmd.grid))?;
            let (ds, _) = io::load(&cmd.input, &grid, &LoadOptions::default())?;
            export::save_as_geotiff(&ds, &cmd.variable, &cmd.output)?;
        }
        Subaction::Sample(cmd) => {
            let ds = io::read_netcdf(&cmd.input)
                .with_context(|| format!("reading {}", cmd.input))?;
            let sampled = sample::sample(&ds, f64::from(cmd.resolution))?;
            io::save(&sampled, &cmd.output)?;
        }
        Subaction::Mask(cmd) => {
            let values: Vec<&str> = cmd.values.iter().map(String::as_str).collect();
            let m = mask::create_mask(&cmd.aux, &cmd.variable, &values, cmd.include_missing)?;
            println!("count: {}", m.count());
            println!("fraction: {:.6}", m.fraction());

            if let (Some(output), Some(grid_path)) = (cmd.output, cmd.grid) {
                let grid = ChukGrid::load(&grid_path)
                    .with_context(|| format!("loading grid {grid_path}"))?;
                let ds = mask::mask_dataset(&m, &grid, "mask")?;
                io::save(&ds, &output)?;
                info!("mask written to {output}");
            }
        }
    }
    Ok(())
}
