use super::SpeechBackend;
use crate::config_loader::Settings;

use std::io::{Error, ErrorKind, Read, Result, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

pub struct EspeakBackend {
    binary: String,
    rate: u32,
    timeout: Option<Duration>,
}

impl EspeakBackend {
    /// `timeout: None` waits for espeak however long it takes.
    pub fn new(binary: impl Into<String>, rate: u32, timeout: Option<Duration>) -> Self {
        Self {
            binary: binary.into(),
            rate,
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.espeak_binary.clone(),
            settings.speech_rate,
            settings.synth_timeout(),
        )
    }

    /// Text goes in on stdin so payloads starting with '-' are never read as flags.
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--stdout")
            .arg("-s")
            .arg(self.rate.to_string())
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn feed(child: &mut Child, text: &str) -> Result<()> {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::new(ErrorKind::BrokenPipe, "espeak stdin unavailable"))?;
        stdin.write_all(text.as_bytes())?;
        stdin.write_all(b"\n")?;
        // Dropping stdin closes the pipe and lets espeak finish
        Ok(())
    }
}

impl SpeechBackend for EspeakBackend {
    fn id(&self) -> &'static str {
        "espeak-ng"
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let mut child = self.command().spawn()?;

        // stdout is drained on its own thread: a few seconds of WAV overflows the pipe buffer
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::new(ErrorKind::BrokenPipe, "espeak stdout unavailable"))?;
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        if let Err(e) = Self::feed(&mut child, text) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        let status = match self.timeout {
            Some(limit) => child.wait_timeout(limit)?,
            None => Some(child.wait()?),
        };

        match status {
            Some(status) => {
                let audio = reader
                    .join()
                    .map_err(|_| Error::new(ErrorKind::Other, "espeak reader panicked"))??;
                if status.success() {
                    debug!(bytes = audio.len(), "espeak synthesized audio");
                    Ok(audio)
                } else {
                    let mut stderr = String::new();
                    if let Some(mut err) = child.stderr.take() {
                        let _ = err.read_to_string(&mut stderr);
                    }
                    Err(Error::new(
                        ErrorKind::Other,
                        format!("espeak error: {}", stderr.trim()),
                    ))
                }
            }
            None => {
                // Timeout occurred, kill the process
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                Err(Error::new(
                    ErrorKind::TimedOut,
                    format!("Backend timed out after {:?}", self.timeout.unwrap_or_default()),
                ))
            }
        }
    }
}
