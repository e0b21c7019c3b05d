//! Subcommand dispatch, mapping 1:1 onto the core's host-visible
//! operations.

use color_eyre::eyre::{Result, WrapErr};

use crate::cli_args::{Cli, Command, ThemeCommand};
use crate::config::SelectionConfig;
use crate::db::ImageDatabase;
use crate::indexer::Indexer;
use crate::model::SelectionConstraints;
use crate::palette_extractor::PaletteExtractor;
use crate::selector::Selector;
use crate::stats::StatisticsCache;
use crate::theming::ThemingEngine;
use crate::time_adapter::TimeAdapter;

pub fn run(cli: &Cli, command: &Command) -> Result<()> {
    let db = ImageDatabase::open(&cli.db_path).wrap_err("failed to open image database")?;
    let config = SelectionConfig::load(&cli.config_path).wrap_err("failed to load configuration")?;

    match command {
        Command::Index {
            folders,
            recursive,
            favorites_root,
            source_id,
        } => {
            let mut indexer = Indexer::new(&db);
            if let Some(root) = favorites_root {
                indexer = indexer.with_favorites_root(root.clone());
            }
            for folder in folders {
                let result = indexer.index_folder_with_source(
                    folder,
                    *recursive,
                    source_id.as_deref(),
                    None,
                )?;
                println!(
                    "{}: added {} updated {} removed {}",
                    folder.display(),
                    result.added,
                    result.updated,
                    result.removed
                );
            }
        }

        Command::Select {
            count,
            favorites_only,
            min_width,
            min_height,
            source,
            min_similarity,
            continuity,
        } => {
            let selector = Selector::new(&db);
            let constraints = SelectionConstraints {
                min_width: *min_width,
                min_height: *min_height,
                source_whitelist: if source.is_empty() {
                    None
                } else {
                    Some(source.clone())
                },
                favorites_only: *favorites_only,
                min_similarity: *min_similarity,
                continuity: *continuity,
                ..Default::default()
            };
            let now = crate::now_unix();
            let results = selector.select(*count, &config, &constraints, now)?;
            for image in results {
                println!("{}", image.filepath);
            }
        }

        Command::RecordShown { path } => {
            let selector = Selector::new(&db);
            selector.record_shown(&path.to_string_lossy(), None, crate::now_unix())?;
        }

        Command::RebuildIndex { folders } => {
            let indexer = Indexer::new(&db);
            let backup_path = cli.db_path.with_extension("backup.db");
            let result = indexer.rebuild_index(folders, Some(&backup_path), None)?;
            println!(
                "rebuilt: added {} updated {} removed {}",
                result.added, result.updated, result.removed
            );
        }

        Command::ExtractPalettes {
            wallust_toml,
            cache_root,
        } => {
            let extractor = PaletteExtractor::new(wallust_toml.clone(), cache_root.clone());
            let mut offset = 0;
            loop {
                let batch = db.get_images_without_palettes(100, offset)?;
                if batch.is_empty() {
                    break;
                }
                let paths: Vec<String> = batch.iter().map(|i| i.filepath.clone()).collect();
                for (path, result) in extractor.extract_batch(&paths) {
                    match result {
                        Ok(palette) => db.upsert_palette(&palette)?,
                        Err(e) => tracing::warn!(path, error = %e, "palette extraction failed"),
                    }
                }
                offset += 100;
            }
        }

        Command::Stats => {
            let cache = StatisticsCache::new(&db);
            let stats = cache.get()?;
            println!("{stats:#?}");
        }

        Command::ClearHistory => {
            db.clear_history()?;
        }

        Command::TimePeriod => {
            let adapter = TimeAdapter::new(&config.time_adaptation);
            let now = chrono::Local::now();
            println!("{:?}", adapter.current_period(now));
            println!("{:?}", adapter.palette_target(now));
        }

        Command::Theme { action } => match action {
            ThemeCommand::Apply {
                path,
                registry,
                overlay,
            } => {
                let engine = ThemingEngine::new(&db, registry.clone(), overlay.clone());
                engine.apply(&path.to_string_lossy())?;
            }
        },
    }

    Ok(())
}
