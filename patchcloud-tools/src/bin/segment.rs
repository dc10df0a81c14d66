use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{App, Arg, ArgMatches};
use log::info;
use patchcloud_algorithms::{
    classification::{classify, PatchParameters},
    normal_estimation::{with_estimated_normals, DEFAULT_NEIGHBOURS},
};
use patchcloud_core::{
    containers::{PatchKind, PointCloud},
    math::NormalComparison,
};
use patchcloud_io::base::{read_all, write_all};

struct Args {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub params: PatchParameters,
    pub neighbours: Option<usize>,
    pub refactor: bool,
    pub colorize: bool,
}

fn parse_value<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    matches
        .value_of(name)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("Invalid value '{}' for {}", value, name))
        })
        .transpose()
}

fn get_args() -> Result<Args> {
    let matches = App::new("patchcloud segment")
        .version("0.1")
        .about("Splits a point cloud into regular, irregular and isolated patches")
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
                .help("Output file for the classified patches")
                .required(true),
        )
        .arg(
            Arg::with_name("MAX_PATCH_SIZE")
                .long("max-patch-size")
                .takes_value(true)
                .help("Maximum number of points per patch (default 5000)"),
        )
        .arg(
            Arg::with_name("REGULAR_FRACTION")
                .long("regular-fraction")
                .takes_value(true)
                .help("Minimum size of regular patches as a fraction of the maximum patch size (default 0.01)"),
        )
        .arg(
            Arg::with_name("IRREGULAR_MIN_SIZE")
                .long("irregular-min-size")
                .takes_value(true)
                .help("Minimum number of points of irregular patches (default 10)"),
        )
        .arg(
            Arg::with_name("NORMAL_THRESHOLD")
                .long("normal-threshold")
                .takes_value(true)
                .help("Maximum distance between the mean normals of merged regions. Estimated per voxel if omitted"),
        )
        .arg(
            Arg::with_name("SIGNED_NORMALS")
                .long("signed-normals")
                .help("Compare normals with their sign instead of their absolute values"),
        )
        .arg(
            Arg::with_name("COLOR_ACCURACY")
                .long("color-accuracy")
                .takes_value(true)
                .help("Bucket size of the color comparison (default 69)"),
        )
        .arg(
            Arg::with_name("MAX_DEPTH")
                .long("max-depth")
                .takes_value(true)
                .help("Maximum depth of the octree (default 32)"),
        )
        .arg(
            Arg::with_name("ESTIMATE_NORMALS")
                .short("n")
                .long("estimate-normals")
                .takes_value(true)
                .min_values(0)
                .value_name("K")
                .help("Estimate missing normals from the K nearest neighbours of every point"),
        )
        .arg(
            Arg::with_name("REFACTOR")
                .short("r")
                .long("refactor")
                .help("Recreate the patches even if the input file is classified already"),
        )
        .arg(
            Arg::with_name("COLORIZE")
                .short("c")
                .long("colorize")
                .help("Color the points by the kind of their patch"),
        )
        .get_matches();

    let defaults = PatchParameters::default();
    let params = PatchParameters {
        max_patch_size: parse_value(&matches, "MAX_PATCH_SIZE")?
            .unwrap_or(defaults.max_patch_size),
        regular_fraction: parse_value(&matches, "REGULAR_FRACTION")?
            .unwrap_or(defaults.regular_fraction),
        irregular_min_size: parse_value(&matches, "IRREGULAR_MIN_SIZE")?
            .unwrap_or(defaults.irregular_min_size),
        normal_threshold: parse_value(&matches, "NORMAL_THRESHOLD")?,
        normal_comparison: if matches.is_present("SIGNED_NORMALS") {
            NormalComparison::Signed
        } else {
            NormalComparison::Unsigned
        },
        color_accuracy: parse_value(&matches, "COLOR_ACCURACY")?
            .unwrap_or(defaults.color_accuracy),
        max_depth: parse_value(&matches, "MAX_DEPTH")?.unwrap_or(defaults.max_depth),
    };
    let neighbours = if matches.is_present("ESTIMATE_NORMALS") {
        Some(parse_value(&matches, "ESTIMATE_NORMALS")?.unwrap_or(DEFAULT_NEIGHBOURS))
    } else {
        None
    };

    Ok(Args {
        input_file: PathBuf::from(matches.value_of("INPUT").context("No input file")?),
        output_file: PathBuf::from(matches.value_of("OUTPUT").context("No output file")?),
        params,
        neighbours,
        refactor: matches.is_present("REFACTOR"),
        colorize: matches.is_present("COLORIZE"),
    })
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = get_args()?;

    let mut patches = read_all(&args.input_file, &args.params)?;
    if args.refactor || args.neighbours.is_some() {
        let mut points = patches.take_points().into_iter().collect::<PointCloud>();
        if let Some(k_nn) = args.neighbours {
            info!("Estimating normals from {} neighbours", k_nn);
            points = with_estimated_normals(points, k_nn.max(3));
        }
        patches = classify(&points, &args.params);
    }
    if args.colorize {
        patches.colorize_by_kind();
    }
    write_all(&patches, &args.output_file)?;

    println!(
        "patchcloud segment report for {}",
        args.input_file.display()
    );
    println!(
        "{} points in {} patches",
        patches.point_count(),
        patches.len()
    );
    for kind in PatchKind::ALL.iter() {
        let keys = patches.keys_of(*kind);
        let points = keys
            .iter()
            .filter_map(|key| patches.get(key))
            .map(PointCloud::len)
            .sum::<usize>();
        println!("\t{:?}: {} patches, {} points", kind, keys.len(), points);
    }
    Ok(())
}
