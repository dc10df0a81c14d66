use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{App, Arg};
use log::info;
use patchcloud_algorithms::{
    classification::PatchParameters,
    distance::{PairStrategy, PatchesDistanceEstimation},
};
use patchcloud_io::base::read_all;

struct Args {
    pub input_file: PathBuf,
    pub output_file: Option<PathBuf>,
    pub estimation: PatchesDistanceEstimation,
}

fn get_args() -> Result<Args> {
    let matches = App::new("patchcloud distances")
        .version("0.1")
        .about("Prints the minimum distances between the patches of a classified point cloud")
        .arg(
            Arg::with_name("INPUT")
                .short("i")
                .long("input")
                .takes_value(true)
                .value_name("INPUT")
                .help("Input point cloud file")
                .required(true),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("Output file for the distances. Distances are printed to stdout if omitted"),
        )
        .arg(
            Arg::with_name("MAX_DISTANCE")
                .short("d")
                .long("max-distance")
                .takes_value(true)
                .help("Maximum distance in X between the centroids of two patches (default 1)"),
        )
        .arg(
            Arg::with_name("TIMEOUT")
                .short("t")
                .long("timeout")
                .takes_value(true)
                .value_name("SECONDS")
                .help("Time to wait for all distances"),
        )
        .arg(
            Arg::with_name("BRUTE_FORCE")
                .long("brute-force")
                .help("Compute the distances of all pairs of patches"),
        )
        .get_matches();

    let mut estimation = PatchesDistanceEstimation::new();
    if let Some(max_distance) = matches.value_of("MAX_DISTANCE") {
        estimation = estimation.with_max_distance(
            max_distance
                .parse()
                .with_context(|| format!("Invalid maximum distance '{}'", max_distance))?,
        );
    }
    if let Some(timeout) = matches.value_of("TIMEOUT") {
        let seconds = timeout
            .parse::<u64>()
            .with_context(|| format!("Invalid timeout '{}'", timeout))?;
        estimation = estimation.with_timeout(Duration::from_secs(seconds));
    }
    if matches.is_present("BRUTE_FORCE") {
        estimation = estimation.with_strategy(PairStrategy::BruteForce);
    }

    Ok(Args {
        input_file: PathBuf::from(matches.value_of("INPUT").context("No input file")?),
        output_file: matches.value_of("OUTPUT").map(PathBuf::from),
        estimation,
    })
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = get_args()?;

    let patches = read_all(&args.input_file, &PatchParameters::default())?;
    let mut output: Box<dyn Write> = match &args.output_file {
        Some(path) => Box::new(BufWriter::new(File::create(path).context(format!(
            "Could not create output file {}",
            path.display()
        ))?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let complete = args.estimation.run(&patches, |estimation, patches| -> Result<bool> {
        info!(
            "Estimated {} distances between {} patches",
            estimation.distances().len(),
            patches.len()
        );
        for entry in estimation.distances() {
            writeln!(
                output,
                "{}\t{}\t{}",
                entry.first, entry.second, entry.distance
            )?;
        }
        output.flush()?;
        Ok(estimation.is_complete())
    })?;

    if !complete {
        bail!(
            "Not all distances between the patches of {} could be computed",
            args.input_file.display()
        );
    }
    Ok(())
}
