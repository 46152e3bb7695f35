use luminaire_lib::{image_processing, Config, Database};
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

fn usage() {
    println!("Removes orphaned and partially written files from the thumbnail cache.");
    println!("Run it while no other luminaire process is generating thumbnails.");
    println!();
    println!("Usage:");
    println!("  prune_thumbnail_cache");
    println!("  prune_thumbnail_cache --data-dir /path/to/luminaire");
}

fn parse_data_dir() -> Result<Option<PathBuf>, String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            "--data-dir" => {
                let Some(path) = args.next() else {
                    return Err("Missing path after --data-dir".to_string());
                };
                return Ok(Some(PathBuf::from(path)));
            }
            unknown => {
                return Err(format!("Unknown argument: {}", unknown));
            }
        }
    }
    Ok(None)
}

fn prune(config: &Config) -> Result<image_processing::CachePruneReport, String> {
    if !config.db_path.exists() {
        return Err(format!(
            "No catalog at {}; refusing to treat every thumbnail as orphaned",
            config.db_path.display()
        ));
    }
    let db = Database::open(&config.db_path, 1).map_err(|error| error.to_string())?;
    let known: HashSet<String> = db
        .all_ids()
        .map_err(|error| error.to_string())?
        .into_iter()
        .collect();
    image_processing::prune_cache_dir(&config.cache_dir, &known).map_err(|error| {
        format!(
            "Failed to prune {}: {}",
            config.cache_dir.display(),
            error
        )
    })
}

fn main() {
    luminaire_lib::init_logging();

    let config = match parse_data_dir() {
        Ok(Some(data_dir)) => Config::load_from(&data_dir),
        Ok(None) => Config::load(),
        Err(error) => {
            eprintln!("{}", error);
            usage();
            std::process::exit(1);
        }
    };

    println!("Using cache directory: {}", config.cache_dir.display());
    match prune(&config) {
        Ok(report) => {
            println!("Thumbnail cache prune complete.");
            println!("  removed_orphans: {}", report.removed_orphans);
            println!("  removed_partials: {}", report.removed_partials);
            println!("  kept: {}", report.kept);
        }
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(1);
        }
    }
}
