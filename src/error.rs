use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Synthesis failed: {0}")]
    Synthesis(#[from] std::io::Error),

    #[error("Failed to decode synthesized audio: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),

    #[error("No audio output device: {0}")]
    Device(#[from] rodio::StreamError),

    #[error("Failed to create sink: {0}")]
    Playback(#[from] rodio::PlayError),

    #[error("Audio thread stopped")]
    EngineStopped,
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Subscribe failed: {0}")]
    Subscribe(#[from] rumqttc::ClientError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
