use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_HOSTNAME: &str = "10.11.15.95";
pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
/// Words per minute handed to the synthesizer.
pub const DEFAULT_SPEECH_RATE: u32 = 50;
/// One request slot per subscribed topic; the subscribes are queued before the
/// event loop is polled again.
pub const MIN_REQUEST_CAPACITY: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    // Broker (MQTT_*)
    pub hostname: String,
    pub port: u16,
    pub keep_alive_secs: u64,
    pub client_id: String,
    pub request_capacity: usize,
    pub reconnect_delay_secs: u64,
    // Speech (TTV_*)
    pub speech_rate: u32,
    pub espeak_binary: String,
    /// 0 disables the limit.
    pub synth_timeout_secs: u64,
    pub enable_audio: bool,
}

fn default_client_id() -> String {
    format!("ttv-announcer-{}", std::process::id())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            port: DEFAULT_PORT,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            client_id: default_client_id(),
            request_capacity: 10,
            reconnect_delay_secs: 1,
            speech_rate: DEFAULT_SPEECH_RATE,
            espeak_binary: "espeak-ng".to_string(),
            synth_timeout_secs: 0,
            enable_audio: true,
        }
    }
}

impl Settings {
    /// Defaults, then `Announcer.*` in the working directory, then the user
    /// config dir, then `extra`, then `MQTT_*` / `TTV_*` environment variables.
    pub fn load(extra: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("hostname", defaults.hostname)?
            .set_default("port", defaults.port as u64)?
            .set_default("keep_alive_secs", defaults.keep_alive_secs)?
            .set_default("client_id", defaults.client_id)?
            .set_default("request_capacity", defaults.request_capacity as u64)?
            .set_default("reconnect_delay_secs", defaults.reconnect_delay_secs)?
            .set_default("speech_rate", defaults.speech_rate as u64)?
            .set_default("espeak_binary", defaults.espeak_binary)?
            .set_default("synth_timeout_secs", defaults.synth_timeout_secs)?
            .set_default("enable_audio", defaults.enable_audio)?
            .add_source(File::with_name("Announcer").required(false));

        if let Some(dir) = dirs::config_dir() {
            let user_file = dir.join("ttv-announcer").join("Announcer");
            builder =
                builder.add_source(File::with_name(&user_file.to_string_lossy()).required(false));
        }

        if let Some(path) = extra {
            builder = builder.add_source(File::from(path).required(true));
        }

        // MQTT_HOSTNAME -> hostname, TTV_SPEECH_RATE -> speech_rate
        let builder = builder
            .add_source(Environment::with_prefix("MQTT").try_parsing(true))
            .add_source(Environment::with_prefix("TTV").try_parsing(true));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Message("port must be non-zero".to_string()));
        }
        if self.request_capacity < MIN_REQUEST_CAPACITY {
            return Err(ConfigError::Message(format!(
                "Invalid request_capacity: {}. Must be at least {}",
                self.request_capacity, MIN_REQUEST_CAPACITY
            )));
        }
        if self.speech_rate == 0 || self.speech_rate > 1000 {
            return Err(ConfigError::Message(format!(
                "Invalid speech_rate: {}. Must be between 1 and 1000",
                self.speech_rate
            )));
        }
        Ok(())
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn synth_timeout(&self) -> Option<Duration> {
        (self.synth_timeout_secs > 0).then(|| Duration::from_secs(self.synth_timeout_secs))
    }
}
