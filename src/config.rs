//! Command line and environment configuration.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "hebrew-tts-server")]
#[command(about = "Hebrew text-to-speech server with reference voice imitation")]
#[command(version)]
pub struct Config {
    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 7860, env = "PORT")]
    pub port: u16,

    /// Directory holding reference voice samples (*.wav)
    #[arg(long, default_value = "StyleTTS2-lite/Demo/Audio", env = "VOICES_DIR")]
    pub voices_dir: PathBuf,

    /// Directory generated audio is written to
    #[arg(long, default_value = "samples", env = "SAMPLES_DIR")]
    pub samples_dir: PathBuf,

    /// Directory served at `/`
    #[arg(long, default_value = "static", env = "STATIC_DIR")]
    pub static_dir: PathBuf,

    /// Reference voice used by the API when a request names none
    #[arg(long, default_value = "10_michael.wav", env = "DEFAULT_VOICE")]
    pub default_voice: String,

    /// Exported synthesis model; `<model>.json` must sit next to it
    #[arg(long, default_value = "stts2-light.onnx", env = "TTS_MODEL")]
    pub model: PathBuf,

    /// Command that diacritizes text read from stdin
    #[arg(long, default_value = "phonikud", env = "DIACRITIZER_CMD")]
    pub diacritizer_cmd: String,

    /// Command that phonemizes vocalized text read from stdin
    #[arg(long, default_value = "phonikud-phonemize", env = "PHONEMIZER_CMD")]
    pub phonemizer_cmd: String,

    /// Upper bound on a single synthesis call
    #[arg(long, default_value_t = 300, env = "SYNTHESIS_TIMEOUT_SECS")]
    pub synthesis_timeout_secs: u64,

    /// Upper bound on diacritizing and phonemizing one request
    #[arg(long, default_value_t = 60, env = "PHONEMIZE_TIMEOUT_SECS")]
    pub phonemize_timeout_secs: u64,

    /// ONNX Runtime intra-op threads
    #[arg(long, default_value_t = 4, env = "INTRA_THREADS")]
    pub intra_threads: usize,
}

impl Config {
    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs.max(1))
    }

    pub fn phonemize_timeout(&self) -> Duration {
        Duration::from_secs(self.phonemize_timeout_secs.max(1))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["hebrew-tts-server"]).unwrap();
        assert_eq!(config.samples_dir, PathBuf::from("samples"));
        assert_eq!(config.default_voice, "10_michael.wav");
        assert_eq!(config.synthesis_timeout(), Duration::from_secs(300));
        assert_eq!(config.phonemize_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_flags_override() {
        let config = Config::try_parse_from([
            "hebrew-tts-server",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--phonemizer-cmd",
            "espeak-ng --ipa -q -v he",
            "--synthesis-timeout-secs",
            "0",
        ])
        .unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.phonemizer_cmd, "espeak-ng --ipa -q -v he");
        assert_eq!(config.synthesis_timeout(), Duration::from_secs(1));
    }
}
