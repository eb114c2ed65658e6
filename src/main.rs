mod calendar;
mod clock;
mod db;
mod engine;
mod models;
mod run;
mod settings;
mod store;

use anyhow::Result;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let settings = settings::Settings::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.clone())
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("using database {}", settings.db_path.display());
    let db = db::Database::open(&settings.db_path)?;
    run::as_cli(&args, &db, &settings)
}
