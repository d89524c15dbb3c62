use sentinel_ratatui::{
    ai::GeminiClient,
    app::App,
    error::{AppError, Result},
    logging,
    persona::Persona,
    secrets::{load_api_key, secrets_path},
    settings::{Settings, data_dir},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn load_settings() -> Result<(PathBuf, Settings)> {
    let dir = data_dir()?;
    let settings = Settings::load_or_create(&dir)?;
    Ok((dir, settings))
}

// The key is read once and only ever handed to the client.
fn connect(dir: &Path, settings: &Settings, persona: &Persona) -> Result<GeminiClient> {
    let api_key = load_api_key(&secrets_path(dir))?;
    Ok(GeminiClient::new(api_key, settings, persona)?)
}

fn fail(err: AppError) -> ! {
    let message = match err {
        AppError::Config(e) => e.to_string(),
        AppError::AI(e) => format!("Error configuring API: {e}"),
        AppError::IO(e) => e.to_string(),
    };
    log::error!("{message}");
    eprintln!("{message}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let (dir, settings) = load_settings().unwrap_or_else(|e| fail(e));

    if let Err(e) = logging::init(&dir, settings.debug_mode) {
        eprintln!("Warning: logging disabled: {e}");
    }
    log::info!("Sentinel-X start: {}", chrono::Local::now());

    let persona = Persona::sentinel_x();
    let client = connect(&dir, &settings, &persona).unwrap_or_else(|e| fail(e));
    log::info!("Using model {}", client.model());

    let mut app = App::new(Arc::new(client), persona, settings);
    app.run().await
}
