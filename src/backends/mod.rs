pub mod espeak;

/// Trait that all speech synthesis backends must implement.
/// Backends render text to an encoded audio buffer (WAV) that the engine plays.
pub trait SpeechBackend: Send + Sync {
    /// Returns the encoded audio produced for `text` or an error
    fn synthesize(&self, text: &str) -> std::io::Result<Vec<u8>>;

    /// Returns the unique ID of the backend (e.g., "espeak-ng")
    fn id(&self) -> &'static str;
}
