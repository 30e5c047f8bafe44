use crate::backends::SpeechBackend;
use crate::error::SpeechError;
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::mpsc::{channel, sync_channel, Sender};
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Renders text as audible speech. `speak` resolves once playback has finished.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

struct SpeakRequest {
    text: String,
    done: oneshot::Sender<Result<(), SpeechError>>,
}

/// Plays synthesized speech on the default output device.
///
/// The rodio stream is not `Send`, so it lives on a dedicated audio thread;
/// callers hand it one request at a time and wait for the completion signal.
#[derive(Clone)]
pub struct AudioEngine {
    tx: Sender<SpeakRequest>,
}

impl AudioEngine {
    /// Starts the audio thread and opens the output device.
    /// Fails if no output device is available.
    pub fn new(backend: Box<dyn SpeechBackend>) -> Result<Self, SpeechError> {
        let (tx, rx) = channel::<SpeakRequest>();
        let (ready_tx, ready_rx) = sync_channel::<Result<(), SpeechError>>(1);

        info!(backend = backend.id(), "Starting audio engine");

        thread::Builder::new()
            .name("audio".to_string())
            .spawn(move || {
                // Audio stream must live on this thread
                let (_stream, stream_handle) = match OutputStream::try_default() {
                    Ok(pair) => {
                        let _ = ready_tx.send(Ok(()));
                        pair
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                };

                while let Ok(request) = rx.recv() {
                    let result = play(backend.as_ref(), &stream_handle, &request.text);
                    let _ = request.done.send(result);
                }
            })
            .map_err(|_| SpeechError::EngineStopped)?;

        ready_rx.recv().map_err(|_| SpeechError::EngineStopped)??;
        Ok(Self { tx })
    }
}

fn play(
    backend: &dyn SpeechBackend,
    handle: &OutputStreamHandle,
    text: &str,
) -> Result<(), SpeechError> {
    debug!("Audio Thread: Synthesizing '{}'", text);
    let wav = backend.synthesize(text)?;
    let source = Decoder::new(Cursor::new(wav))?;
    let sink = Sink::try_new(handle)?;
    sink.append(source.convert_samples::<f32>());
    sink.sleep_until_end();
    Ok(())
}

#[async_trait]
impl SpeechSink for AudioEngine {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let (done, finished) = oneshot::channel();
        self.tx
            .send(SpeakRequest {
                text: text.to_string(),
                done,
            })
            .map_err(|_| SpeechError::EngineStopped)?;
        finished.await.map_err(|_| SpeechError::EngineStopped)?
    }
}

/// Logs phrases instead of playing them (`--silent` / `enable_audio = false`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

#[async_trait]
impl SpeechSink for SilentSink {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        info!("(silent) {}", text);
        Ok(())
    }
}
