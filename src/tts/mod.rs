pub mod onnx;
pub mod phonemizer;
pub mod store;
pub mod synthesis;
pub mod voice;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub use onnx::OnnxEngine;
pub use phonemizer::{CommandDiacritizer, CommandPhonemizer, ExternalCommand, PhonemizationAdapter};
pub use store::OutputStore;
pub use synthesis::SynthesisInvoker;
pub use voice::VoiceCatalog;

/// What the request text contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    /// Already a phoneme string; used as is.
    Phonemes,
    /// Plain Hebrew; needs diacritization first.
    Unvocalized,
    /// Hebrew with nikud.
    Vocalized,
}

impl InputType {
    pub const ALL: [InputType; 3] = [
        InputType::Phonemes,
        InputType::Unvocalized,
        InputType::Vocalized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Phonemes => "phonemes",
            InputType::Unvocalized => "unvocalized",
            InputType::Vocalized => "vocalized",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            InputType::Phonemes => 0,
            InputType::Unvocalized => 1,
            InputType::Vocalized => 2,
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub text: String,
    pub input_type: InputType,
    pub reference_voice: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub filename: String,
    pub phonemes: String,
    pub vocalized_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Phonemizing,
    Synthesizing,
    Persisting,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Phonemizing => "phonemizing",
            Stage::Synthesizing => "synthesizing",
            Stage::Persisting => "persisting",
            Stage::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Upper bound on diacritization plus phonemization unless configured otherwise.
pub const DEFAULT_PHONEMIZE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct TtsService {
    phonemizer: PhonemizationAdapter,
    catalog: VoiceCatalog,
    synthesizer: SynthesisInvoker,
    store: OutputStore,
    phonemize_timeout: Duration,
}

impl TtsService {
    pub fn new(
        phonemizer: PhonemizationAdapter,
        catalog: VoiceCatalog,
        synthesizer: SynthesisInvoker,
        store: OutputStore,
    ) -> Self {
        Self {
            phonemizer,
            catalog,
            synthesizer,
            store,
            phonemize_timeout: DEFAULT_PHONEMIZE_TIMEOUT,
        }
    }

    pub fn with_phonemize_timeout(mut self, timeout: Duration) -> Self {
        self.phonemize_timeout = timeout;
        self
    }

    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, AppError> {
        let mut stage = Stage::Validating;
        let result = self.run(request, &mut stage).await;

        match &result {
            Ok(generated) => tracing::info!(
                "Generated {} ({} phonemes)",
                generated.filename,
                generated.phonemes.chars().count()
            ),
            Err(e) => tracing::error!(
                stage = %stage,
                kind = e.kind(),
                "Generation failed: {}",
                e
            ),
        }

        result
    }

    async fn run(
        &self,
        request: GenerationRequest,
        stage: &mut Stage,
    ) -> Result<GenerationResult, AppError> {
        // 1. Validate
        let text = request.text.trim().to_string();
        if text.is_empty() {
            return Err(AppError::Validation("Text input is required".into()));
        }
        if request.reference_voice.trim().is_empty() {
            return Err(AppError::Validation(
                "Reference audio file is required".into(),
            ));
        }
        let reference = self.catalog.resolve(&request.reference_voice)?;
        let input_type = request.input_type;

        // 2. Phonemize
        advance(stage, Stage::Phonemizing);
        let adapter = self.phonemizer.clone();
        let task = tokio::task::spawn_blocking(move || adapter.phonemize(&text, input_type));
        let phonemized = match tokio::time::timeout(self.phonemize_timeout, task).await {
            Ok(joined) => joined.map_err(|e| {
                AppError::Phonemization(format!("Phonemization task failed: {}", e))
            })??,
            Err(_) => {
                return Err(AppError::Phonemization(format!(
                    "Phonemization timed out after {}s",
                    self.phonemize_timeout.as_secs_f32()
                )))
            }
        };

        // 3. Synthesize
        advance(stage, Stage::Synthesizing);
        let waveform = self
            .synthesizer
            .synthesize(phonemized.phonemes.clone(), reference)
            .await?;
        tracing::debug!("Synthesized {:.2}s of audio", waveform.duration_secs());

        // 4. Persist
        advance(stage, Stage::Persisting);
        let filename = self.store.persist(waveform, input_type).await?;

        advance(stage, Stage::Completed);
        Ok(GenerationResult {
            filename,
            phonemes: phonemized.phonemes,
            vocalized_text: phonemized.vocalized_text,
        })
    }

    pub fn list_voices(&self) -> Result<Vec<String>, AppError> {
        self.catalog.list_voices()
    }

    pub async fn open_audio(&self, filename: &str) -> Result<Vec<u8>, AppError> {
        self.store.open(filename).await
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    tracing::debug!("Pipeline {} -> {}", stage, next);
    *stage = next;
}
