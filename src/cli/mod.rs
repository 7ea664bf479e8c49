use std::fs::canonicalize;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use itertools::Itertools;

use crate::cli::args::{Args, Command};
use crate::config::{parse_characterization_config, parse_design_config};
use crate::derived::DerivedQuantity;
use crate::design::{run_design, DesignOutcome};
use crate::netlist::write_verify_netlist;
use crate::oracle::SquareLawOracle;
use crate::paths::{out_json, out_png, out_spice};
use crate::plot::{design_marker, plot_vs_gmid, ChartParams};
use crate::table::{TableBuilder, TableSet};

pub mod args;

pub const BANNER: &str = r"
                    _      _  ____   ____
  __ _  _ __ ___   (_)  __| ||___ \ |___ \
 / _` || '_ ` _ \  | | / _` |  __) |  __) |
| (_| || | | | | | | || (_| | / __/  / __/
 \__, ||_| |_| |_| |_| \__,_||_____||_____|
 |___/

gmid22 v0.1
";

pub fn run() -> Result<()> {
    let args = Args::parse();

    println!("{BANNER}");

    match args.command {
        Command::Characterize { config, output_dir } => characterize(&config, output_dir),
        Command::Design {
            config,
            tables,
            output_dir,
            no_plots,
        } => design(&config, &tables, output_dir, no_plots),
    }
}

fn work_dir(output_dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = output_dir.unwrap_or_else(|| PathBuf::from(crate::BUILD_PATH));
    std::fs::create_dir_all(&dir)?;
    Ok(canonicalize(dir)?)
}

fn characterize(config: &Path, output_dir: Option<PathBuf>) -> Result<()> {
    let config_path = canonicalize(config)?;
    println!("Reading configuration file...\n");
    let config = parse_characterization_config(&config_path)?;

    println!("Configuration file: {:?}", &config_path);
    println!("Characterization parameters:");
    println!("\tReference width: {} m", config.ref_width);
    println!("\tWorkers: {}", config.workers);
    println!("\tModels: {}\n", config.models.len());

    let work_dir = work_dir(output_dir)?;
    let mut set = TableSet::new();
    for name in config.models.keys().sorted() {
        let model = &config.models[name];
        let sweep = model.sweep()?;
        let oracle = SquareLawOracle::with_defaults(model.polarity);
        println!(
            "Characterizing {} ({} grid points)...",
            name.bold(),
            sweep.num_points()
        );
        let table = TableBuilder::new(name.as_str(), sweep, config.ref_width)
            .params(model.params.clone())
            .workers(config.workers)
            .progress(true)
            .build(&oracle)?;
        if table.failed_points.is_empty() {
            println!("  {}", "all points converged".green());
        } else {
            let msg = format!("{} point(s) failed to converge", table.failed_points.len());
            println!("  {}", msg.as_str().yellow());
        }
        set.insert(table);
    }

    let table_path = out_json(&work_dir, "tables");
    crate::io::save_tables(&set, &table_path)?;

    println!("\nArtifacts saved to: {:?}\n", &work_dir);
    Ok(())
}

fn design(
    config: &Path,
    tables: &Path,
    output_dir: Option<PathBuf>,
    no_plots: bool,
) -> Result<()> {
    let config_path = canonicalize(config)?;
    println!("Reading design specification...\n");
    let config = parse_design_config(&config_path)?;
    let set = crate::io::load_tables(canonicalize(tables)?)?;
    let table = set.get(&config.model)?;

    println!("Design request for {}:", config.model.bold());
    println!("\tTarget gm/ID: {} S/A", config.spec.target_gmid);
    println!("\tGain floor: {} V/V", config.spec.gain_min);
    println!("\tBandwidth floor: {} Hz", config.spec.bw_min);
    println!("\tLoad capacitance: {} F", config.spec.load_cap);
    println!(
        "\tBias point: VDS = {} V, VBS = {} V\n",
        config.spec.vds, config.spec.vbs
    );

    let result = run_design(table, &config.spec)?;
    match result.outcome {
        DesignOutcome::RequirementMet => println!("{}", "Requirement met.".green()),
        DesignOutcome::BestEffort => println!(
            "{}",
            "Gain floor unmet; reporting best available operating point.".yellow()
        ),
    }
    println!("{result}");

    let work_dir = work_dir(output_dir)?;
    let netlist_path = out_spice(&work_dir, "verify_op");
    write_verify_netlist(
        &result,
        config.model_lib.as_deref().unwrap_or("models.lib"),
        config.lib_section.as_deref().unwrap_or("tt"),
        netlist_path,
    )?;

    if !no_plots {
        for (name, y) in [
            ("gain_vs_gmid", DerivedQuantity::IntrinsicGain),
            ("ft_vs_gmid", DerivedQuantity::TransitFrequency),
            ("id_density_vs_gmid", DerivedQuantity::CurrentDensity),
        ] {
            plot_vs_gmid(&ChartParams {
                table,
                spec: &config.spec,
                y,
                mark: design_marker(&result, y),
                output_path: out_png(&work_dir, name),
            })?;
        }
    }

    println!("Artifacts saved to: {:?}\n", &work_dir);
    Ok(())
}
