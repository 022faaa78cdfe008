use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod tts;

use api::routes::{create_router, AppState};
use api::RequestPolicy;
use config::Config;
use tts::{
    CommandDiacritizer, CommandPhonemizer, ExternalCommand, OnnxEngine, OutputStore,
    PhonemizationAdapter, SynthesisInvoker, TtsService, VoiceCatalog,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let addr: SocketAddr = config.bind_addr().parse()?;

    tracing::info!("Hebrew TTS Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Voices directory: {}", config.voices_dir.display());
    tracing::info!("Samples directory: {}", config.samples_dir.display());

    let tts = build_service(&config)?;
    let state = Arc::new(AppState {
        tts,
        api_policy: RequestPolicy::api(config.default_voice.clone()),
        web_policy: RequestPolicy::web_form(),
    });

    let app = create_router(state, &config.static_dir);

    tracing::info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_service(config: &Config) -> Result<TtsService, Box<dyn std::error::Error>> {
    let diacritizer = ExternalCommand::parse(&config.diacritizer_cmd)
        .ok_or("DIACRITIZER_CMD must not be empty")?;
    let phonemizer = ExternalCommand::parse(&config.phonemizer_cmd)
        .ok_or("PHONEMIZER_CMD must not be empty")?;
    tracing::info!(
        "Diacritizer: {}, phonemizer: {}",
        diacritizer.program(),
        phonemizer.program()
    );

    tracing::info!("Loading synthesis model {}", config.model.display());
    let engine = OnnxEngine::new(&config.model, config.intra_threads)?;

    Ok(TtsService::new(
        PhonemizationAdapter::new(
            Arc::new(CommandDiacritizer::new(diacritizer)),
            Arc::new(CommandPhonemizer::new(phonemizer)),
        ),
        VoiceCatalog::new(config.voices_dir.clone()),
        SynthesisInvoker::new(Arc::new(engine), config.synthesis_timeout()),
        OutputStore::new(config.samples_dir.clone())?,
    )
    .with_phonemize_timeout(config.phonemize_timeout()))
}
