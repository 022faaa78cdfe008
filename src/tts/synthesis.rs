use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;

/// Sample rate of every waveform this server produces.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParameters {
    pub speed: f32,
    pub denoise: f32,
    pub avg_style: bool,
    pub stabilize: bool,
    pub alpha: f32,
    pub sample_rate: u32,
}

impl Default for SynthesisParameters {
    fn default() -> Self {
        Self {
            speed: 0.82,
            denoise: 0.2,
            avg_style: true,
            stabilize: true,
            alpha: 18.0,
            sample_rate: OUTPUT_SAMPLE_RATE,
        }
    }
}

/// Mono PCM samples in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A model that speaks phonemes in the style of a reference recording.
pub trait SynthesisEngine: Send + Sync {
    fn synthesize_waveform(
        &self,
        phonemes: &str,
        reference_audio: &Path,
        params: &SynthesisParameters,
    ) -> Result<Waveform, AppError>;
}

/// Runs the engine off the async runtime with fixed parameters and a deadline.
#[derive(Clone)]
pub struct SynthesisInvoker {
    engine: Arc<dyn SynthesisEngine>,
    params: SynthesisParameters,
    timeout: Duration,
}

impl SynthesisInvoker {
    pub fn new(engine: Arc<dyn SynthesisEngine>, timeout: Duration) -> Self {
        Self {
            engine,
            params: SynthesisParameters::default(),
            timeout,
        }
    }

    pub async fn synthesize(
        &self,
        phonemes: String,
        reference_audio: PathBuf,
    ) -> Result<Waveform, AppError> {
        if !tokio::fs::try_exists(&reference_audio).await.unwrap_or(false) {
            return Err(AppError::Synthesis(format!(
                "Reference audio not found: {}",
                reference_audio.display()
            )));
        }

        let engine = Arc::clone(&self.engine);
        let params = self.params;
        let task = tokio::task::spawn_blocking(move || {
            engine.synthesize_waveform(&phonemes, &reference_audio, &params)
        });

        let waveform = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result.map_err(into_synthesis)?,
            Ok(Err(join_err)) => {
                return Err(AppError::Synthesis(format!(
                    "Synthesis task failed: {}",
                    join_err
                )))
            }
            Err(_) => {
                return Err(AppError::Synthesis(format!(
                    "Synthesis timed out after {}s",
                    self.timeout.as_secs_f32()
                )))
            }
        };

        if waveform.sample_rate != self.params.sample_rate {
            return Err(AppError::Synthesis(format!(
                "Engine produced {} Hz audio, expected {} Hz",
                waveform.sample_rate, self.params.sample_rate
            )));
        }

        Ok(waveform)
    }
}

fn into_synthesis(err: AppError) -> AppError {
    match err {
        AppError::Synthesis(msg) => AppError::Synthesis(msg),
        other => AppError::Synthesis(other.to_string()),
    }
}
