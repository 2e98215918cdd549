//! pkforecast CLI

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

use pkforecast::prelude::data::read_database;
use pkforecast::prelude::*;

#[derive(Parser)]
#[command(name = "pkforecast")]
#[command(about = "Fit a population concentration model and forecast patient curves")]
#[command(version)]
struct Cli {
    /// Training database (whitespace-separated records)
    train: PathBuf,

    /// Test database; its patients are forecast and optionally fed to the model
    test: Option<PathBuf>,

    /// Settings file (JSON). Defaults are used for anything not given.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Index of the test patient whose curve is predicted
    #[arg(short, long, default_value = "0")]
    patient: usize,

    /// Override the RANSAC seed
    #[arg(long)]
    seed: Option<u64>,

    /// Feed every test measurement to the model before predicting
    #[arg(long)]
    update: bool,

    /// Print the databases as read
    #[arg(long)]
    print_data: bool,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[derive(Serialize)]
struct Report<'a> {
    patient: &'a str,
    n_inliers: usize,
    n_samples: usize,
    coefficients: [f64; 3],
    normalization: &'a NormalizationConstants,
    sigma: f64,
    c: f64,
    replaced: Vec<usize>,
    curve: Curve,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    let mut settings = load_settings(cli.settings.as_deref())?;
    if let Some(seed) = cli.seed {
        settings.ransac.seed = Some(seed);
    }

    let (train, PopulationFit { robust, mut model }) = fit_database(&cli.train, &settings)
        .with_context(|| format!("fitting training database {}", cli.train.display()))?;
    if cli.print_data {
        print!("{}", train);
    }

    let test = match &cli.test {
        Some(path) => {
            let test = read_database(path)
                .with_context(|| format!("reading test database {}", path.display()))?;
            tracing::info!(
                "Testing database: {} patients, {} samples",
                test.len(),
                test.n_samples()
            );
            if cli.print_data {
                print!("{}", test);
            }
            test
        }
        None => train,
    };

    for j in 0..N_COVARIATES {
        tracing::info!(
            "Feature {}, mean {}, std {}",
            j,
            model.constants().means[j],
            model.constants().stds[j]
        );
    }

    let Some(patient) = test.patients().get(cli.patient) else {
        bail!(
            "patient index {} is out of range for {} test patients",
            cli.patient,
            test.len()
        );
    };

    let mut replaced = Vec::new();
    if cli.update {
        for (i, p) in test.patients().iter().enumerate() {
            for sample in p.samples() {
                tracing::debug!("Updating with patient {}, sample at t = {}", i, sample.time);
                replaced.push(model.update(&sample)?.index);
            }
        }
    }

    let curve = model.predict_curve(patient.demographics(), settings.dose, &settings.curve)?;

    let report = Report {
        patient: patient.id(),
        n_inliers: robust.n_inliers(),
        n_samples: robust.n_samples,
        coefficients: robust.coefficients,
        normalization: model.constants(),
        sigma: model.sigma(),
        c: model.c(),
        replaced,
        curve,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
