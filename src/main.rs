use luminaire_lib::commands;
use luminaire_lib::database::{ListFilter, MediaKind};
use luminaire_lib::thumbnails::GenerateMode;
use luminaire_lib::{AppState, Config, StorageProfile};
use serde::Serialize;
use std::env;
use std::path::PathBuf;

fn usage() {
    println!("Local media catalog and thumbnail cache.");
    println!();
    println!("Usage:");
    println!("  luminaire [--data-dir DIR] scan <dir>");
    println!("  luminaire [--data-dir DIR] list [--kind image|video] [--search TEXT] [--sort name|name_desc|size|modified] [--favorites]");
    println!("  luminaire [--data-dir DIR] show <id>");
    println!("  luminaire [--data-dir DIR] thumbs [--all | [--no-wait] <id>...]");
    println!("  luminaire [--data-dir DIR] favorite <id> [--off]");
    println!("  luminaire [--data-dir DIR] sweep [--days N]");
    println!("  luminaire [--data-dir DIR] profile [hdd|ssd]");
}

enum Command {
    Scan(String),
    List {
        filter: ListFilter,
        sort_by: Option<String>,
    },
    Show(String),
    Thumbs {
        all: bool,
        mode: GenerateMode,
        ids: Vec<String>,
    },
    Favorite {
        id: String,
        favorite: bool,
    },
    Sweep(Option<u32>),
    Profile(Option<StorageProfile>),
}

fn parse_args() -> Result<(Option<PathBuf>, Command), String> {
    let mut args = env::args().skip(1).peekable();
    let mut data_dir = None;

    while let Some(arg) = args.peek().cloned() {
        match arg.as_str() {
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            "--data-dir" => {
                args.next();
                let Some(path) = args.next() else {
                    return Err("Missing path after --data-dir".to_string());
                };
                data_dir = Some(PathBuf::from(path));
            }
            _ => break,
        }
    }

    let Some(subcommand) = args.next() else {
        return Err("Missing command".to_string());
    };
    let rest: Vec<String> = args.collect();

    let command = match subcommand.as_str() {
        "scan" => match rest.as_slice() {
            [dir] => Command::Scan(dir.clone()),
            _ => return Err("scan takes exactly one directory".to_string()),
        },
        "list" => parse_list(&rest)?,
        "show" => match rest.as_slice() {
            [id] => Command::Show(id.clone()),
            _ => return Err("show takes exactly one id".to_string()),
        },
        "thumbs" => {
            let mut all = false;
            let mut mode = GenerateMode::Wait;
            let mut ids = Vec::new();
            for arg in rest {
                match arg.as_str() {
                    "--all" => all = true,
                    "--no-wait" => mode = GenerateMode::NoWait,
                    flag if flag.starts_with("--") => {
                        return Err(format!("Unknown argument: {}", flag))
                    }
                    _ => ids.push(arg),
                }
            }
            if all == !ids.is_empty() {
                return Err("thumbs takes either --all or a list of ids".to_string());
            }
            Command::Thumbs { all, mode, ids }
        }
        "favorite" => match rest.as_slice() {
            [id] => Command::Favorite {
                id: id.clone(),
                favorite: true,
            },
            [id, off] if off == "--off" => Command::Favorite {
                id: id.clone(),
                favorite: false,
            },
            _ => return Err("favorite takes an id and an optional --off".to_string()),
        },
        "sweep" => match rest.as_slice() {
            [] => Command::Sweep(None),
            [flag, days] if flag == "--days" => Command::Sweep(Some(
                days.parse::<u32>()
                    .map_err(|_| format!("Invalid day count: {}", days))?,
            )),
            _ => return Err("sweep takes an optional --days N".to_string()),
        },
        "profile" => match rest.as_slice() {
            [] => Command::Profile(None),
            [value] => match value.to_ascii_lowercase().as_str() {
                "hdd" => Command::Profile(Some(StorageProfile::Hdd)),
                "ssd" => Command::Profile(Some(StorageProfile::Ssd)),
                other => return Err(format!("Unknown storage profile: {}", other)),
            },
            _ => return Err("profile takes at most one value".to_string()),
        },
        unknown => return Err(format!("Unknown command: {}", unknown)),
    };

    Ok((data_dir, command))
}

fn parse_list(rest: &[String]) -> Result<Command, String> {
    let mut filter = ListFilter::default();
    let mut sort_by = None;
    let mut args = rest.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--kind" => {
                let value = args.next().ok_or("Missing value after --kind")?;
                filter.kind = Some(
                    MediaKind::parse(value).ok_or_else(|| format!("Unknown kind: {}", value))?,
                );
            }
            "--search" => {
                let value = args.next().ok_or("Missing value after --search")?;
                filter.search = Some(value.clone());
            }
            "--sort" => {
                let value = args.next().ok_or("Missing value after --sort")?;
                sort_by = Some(value.clone());
            }
            "--favorites" => filter.favorites_only = true,
            unknown => return Err(format!("Unknown argument: {}", unknown)),
        }
    }
    Ok(Command::List { filter, sort_by })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
    println!("{}", rendered);
    Ok(())
}

async fn run(command: Command, state: &AppState) -> Result<(), String> {
    match command {
        Command::Scan(dir) => print_json(&commands::scan_dir(dir, state).await?),
        Command::List { filter, sort_by } => {
            for record in commands::list_media(filter, sort_by, state).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.id,
                    record.kind.as_str(),
                    record.size,
                    record.thumbnail_path.as_deref().unwrap_or("-"),
                    record.path
                );
            }
            Ok(())
        }
        Command::Show(id) => print_json(&commands::get_media_detail(id, state).await?),
        Command::Thumbs { all: true, .. } => {
            print_json(&commands::generate_missing_thumbnails(state).await?)
        }
        Command::Thumbs { mode, ids, .. } => print_json(
            &commands::generate_thumbnails_with_mode(ids, mode, state).await?,
        ),
        Command::Favorite { id, favorite } => commands::set_favorite(id, favorite, state).await,
        Command::Sweep(days) => print_json(&commands::sweep_tombstones(days, state).await?),
        Command::Profile(None) => {
            println!("{}", commands::get_storage_profile(state)?.label());
            Ok(())
        }
        Command::Profile(Some(profile)) => commands::set_storage_profile(profile, state),
    }
}

#[tokio::main]
async fn main() {
    luminaire_lib::init_logging();

    let (data_dir, command) = match parse_args() {
        Ok(parsed) => parsed,
        Err(error) => {
            eprintln!("{}", error);
            usage();
            std::process::exit(2);
        }
    };

    luminaire_lib::configure_global_thread_pool();
    let config = match data_dir {
        Some(data_dir) => Config::load_from(&data_dir),
        None => Config::load(),
    };
    let state = match AppState::open(config) {
        Ok(state) => state,
        Err(error) => {
            log::error!("Failed to open catalog: {}", error);
            eprintln!("{}", error);
            std::process::exit(1);
        }
    };

    let outcome = run(command, &state).await;
    if let Err(error) = state.shutdown() {
        log::warn!("Catalog shutdown failed: {}", error);
    }
    if let Err(error) = outcome {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}
