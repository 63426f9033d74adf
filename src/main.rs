mod app;

use app::LearnerApp;
use clap::Parser;
use flashcards_app::backend;
use flashcards_app::config::{BackendConfig, Config, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flashcards", about = "Learn flashcard collections in shuffled rounds")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Learn against the REST service at this URL
    #[arg(long)]
    api_url: Option<String>,

    /// Use the local SQLite store at this path (wins over --api-url)
    #[arg(long)]
    db: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{}", e);
        return Err(e);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_from(&cli.config)?;
    config.apply_env();
    config.apply_overrides(cli.api_url, None);
    if let Some(database_path) = cli.db {
        config.backend = BackendConfig::Local { database_path };
    }
    config.validate()?;

    let backends = backend::connect(&config.backend)?;

    if let Some(store) = &backends.store {
        if store.is_empty()? {
            store.seed_sample_data()?;
        }
        let collections = store.list_collections()?;
        log::info!("Loaded {} collections from the local store", collections.len());
        for collection in &collections {
            log::debug!("  - {} ({} cards)", collection.title, collection.flash_card_count);
        }
    }
    log::info!("{}", backends.learn.describe());

    let settings = config.session.to_settings();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([500.0, 700.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Flashcards App",
        options,
        Box::new(move |_cc| Ok(Box::new(LearnerApp::new(backends, settings)))),
    )?;
    Ok(())
}
