use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use ttv_announcer::backends::espeak::EspeakBackend;
use ttv_announcer::broker::BrokerClient;
use ttv_announcer::config_loader::Settings;
use ttv_announcer::engine::{AudioEngine, SilentSink, SpeechSink};
use ttv_announcer::router::Router;

/// Speaks arrivals and departures published on /ttv/* topics
#[derive(Parser)]
#[command(name = "ttv-announcer")]
#[command(version)]
#[command(about = "Announces MQTT door-tag events with text-to-speech", long_about = None)]
struct Cli {
    /// Extra settings file, applied after the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log phrases instead of playing them
    #[arg(long)]
    silent: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let sink: Arc<dyn SpeechSink> = if cli.silent || !settings.enable_audio {
        info!("Audio disabled, phrases will only be logged");
        Arc::new(SilentSink)
    } else {
        let backend = EspeakBackend::from_settings(&settings);
        info!(rate = settings.speech_rate, "Speech rate set");
        Arc::new(AudioEngine::new(Box::new(backend))?)
    };

    let router = Router::new(sink);
    let client = BrokerClient::new(&settings);

    tokio::select! {
        result = client.run(&router) => {
            let err = match result {
                Ok(never) => match never {},
                Err(e) => e,
            };
            error!("Announcer stopped: {}", err);
            Err(err.into())
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}
