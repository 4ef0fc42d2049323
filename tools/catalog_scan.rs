use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use catalog::config::{config_path_from_env, load_or_create_config, resolve_path};
use catalog::{create_catalog, move_catalog, AddOptions, IndexStore, Reconciler, RedbStore};
use common::{CatalogId, GatherType, MediaKind, NewCatalog};
use metadata::LoftyExtractor;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: catalog_scan <command>
  create <name> <path> <music|video|podcast> [sort-pattern] [rename-pattern]
  list
  add <id> [--playlists] [--no-art] [--subdir <path>]
  verify <id>
  clean <id>
  clean-file <id> <path> [song|video|podcast_episode]
  move <id> <new-path>
  gc";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Wrote default config to {}", config_path.display());
    }
    let index_path = resolve_path(&config_path, &config.index_path);
    let store = Arc::new(RedbStore::open(&index_path)?);
    let shared: Arc<dyn IndexStore> = store.clone();
    let reconciler = Reconciler::new(shared, Arc::new(LoftyExtractor), config)?;

    let progress = |count: usize, label: &str| eprintln!("... {} {}", count, label);

    let mut args = env::args().skip(1);
    let command = args.next().ok_or(USAGE)?;
    let rest: Vec<String> = args.collect();
    match command.as_str() {
        "create" => {
            let name = rest.first().ok_or(USAGE)?;
            let path = rest.get(1).ok_or(USAGE)?;
            let gather_type = rest
                .get(2)
                .and_then(|value| GatherType::parse(value))
                .ok_or(USAGE)?;
            let catalog = create_catalog(
                store.as_ref(),
                NewCatalog {
                    name: name.clone(),
                    path: path.clone(),
                    gather_type,
                    sort_pattern: rest.get(3).cloned().unwrap_or_default(),
                    rename_pattern: rest.get(4).cloned().unwrap_or_default(),
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        "list" => {
            for catalog in store.list_catalogs()? {
                let stats = store.stats_by_catalog(catalog.id)?;
                println!(
                    "{}\t{}\t{}\t{}\t{} songs, {} videos, {} episodes",
                    catalog.id,
                    catalog.name,
                    catalog.gather_type.as_str(),
                    catalog.path,
                    stats.songs,
                    stats.videos,
                    stats.episodes
                );
            }
        }
        "add" => {
            let id = catalog_id(&rest)?;
            let mut options = AddOptions::default();
            let mut flags = rest.iter().skip(1);
            while let Some(flag) = flags.next() {
                match flag.as_str() {
                    "--playlists" => options.parse_playlist = true,
                    "--no-art" => options.gather_art = false,
                    "--subdir" => {
                        options.subdirectory = Some(PathBuf::from(flags.next().ok_or(USAGE)?))
                    }
                    other => return Err(format!("unknown flag {}\n{}", other, USAGE).into()),
                }
            }
            let outcome = reconciler.add(id, &options, &progress)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        "verify" => {
            let outcome = reconciler.verify(catalog_id(&rest)?, &progress)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        "clean" => {
            let outcome = reconciler.clean(catalog_id(&rest)?, &progress)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        "clean-file" => {
            let id = catalog_id(&rest)?;
            let path = rest.get(1).ok_or(USAGE)?;
            let kind = match rest.get(2) {
                Some(value) => MediaKind::parse(value).ok_or(USAGE)?,
                None => MediaKind::Song,
            };
            let outcome = reconciler.clean_file(id, path, kind)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        "move" => {
            let id = catalog_id(&rest)?;
            let path = rest.get(1).ok_or(USAGE)?;
            let catalog = move_catalog(store.as_ref(), reconciler.locks(), id, path)?;
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        "gc" => {
            let stats = store.collect_garbage()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        _ => return Err(USAGE.into()),
    }
    Ok(())
}

fn catalog_id(args: &[String]) -> Result<CatalogId, Box<dyn std::error::Error>> {
    let raw = args.first().ok_or(USAGE)?;
    raw.parse::<CatalogId>()
        .map_err(|_| format!("invalid catalog id {:?}", raw).into())
}
