use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use hound::{SampleFormat, WavReader};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use serde::Deserialize;

use crate::error::AppError;
use crate::tts::synthesis::{SynthesisEngine, SynthesisParameters, Waveform, OUTPUT_SAMPLE_RATE};

/// Sidecar `<model>.json` written next to the exported model.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub phoneme_id_map: HashMap<String, Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: OUTPUT_SAMPLE_RATE,
        }
    }
}

impl ModelConfig {
    pub fn load(model_path: &Path) -> Result<Self, AppError> {
        let config_path = config_path_for(model_path);
        if !config_path.exists() {
            return Err(AppError::Synthesis(format!(
                "Missing model config {}",
                config_path.display()
            )));
        }

        serde_json::from_reader(File::open(&config_path)?).map_err(|e| {
            AppError::Synthesis(format!(
                "Invalid model config {}: {}",
                config_path.display(),
                e
            ))
        })
    }
}

fn config_path_for(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

/// Exported StyleTTS2 model served through ONNX Runtime.
///
/// Inputs, in order: phoneme ids `[1, n]`, lengths `[1]`, reference audio
/// `[1, m]` and `[speed, denoise, alpha, avg_style, stabilize]`.
pub struct OnnxEngine {
    session: Mutex<Session>,
    config: ModelConfig,
}

impl OnnxEngine {
    pub fn new(model_path: &Path, intra_threads: usize) -> Result<Self, AppError> {
        if !model_path.exists() {
            return Err(AppError::Synthesis(format!(
                "Model not found: {}",
                model_path.display()
            )));
        }
        let config = ModelConfig::load(model_path)?;
        if config.audio.sample_rate != OUTPUT_SAMPLE_RATE {
            return Err(AppError::Synthesis(format!(
                "Model reports {} Hz output, expected {} Hz",
                config.audio.sample_rate, OUTPUT_SAMPLE_RATE
            )));
        }

        let session = Session::builder()
            .map_err(|e| AppError::Synthesis(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| AppError::Synthesis(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(intra_threads)
            .map_err(|e| AppError::Synthesis(format!("Failed to set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| AppError::Synthesis(format!("Failed to load model: {}", e)))?;

        Ok(Self {
            session: Mutex::new(session),
            config,
        })
    }
}

impl SynthesisEngine for OnnxEngine {
    fn synthesize_waveform(
        &self,
        phonemes: &str,
        reference_audio: &Path,
        params: &SynthesisParameters,
    ) -> Result<Waveform, AppError> {
        let sample_rate = self.config.audio.sample_rate;
        let ids = phonemes_to_ids(phonemes, &self.config.phoneme_id_map);
        let reference = read_reference_audio(reference_audio)?;
        if reference.is_empty() {
            return Err(AppError::Synthesis(format!(
                "Reference audio is empty: {}",
                reference_audio.display()
            )));
        }

        let input_len = ids.len();
        let reference_len = reference.len();

        let input_value = Value::from_array((vec![1, input_len], ids))
            .map_err(|e| AppError::Synthesis(format!("Failed to create input tensor: {}", e)))?;

        let lengths_value = Value::from_array((vec![1], vec![input_len as i64]))
            .map_err(|e| AppError::Synthesis(format!("Failed to create lengths tensor: {}", e)))?;

        let reference_value = Value::from_array((vec![1, reference_len], reference))
            .map_err(|e| {
                AppError::Synthesis(format!("Failed to create reference tensor: {}", e))
            })?;

        let params_value = Value::from_array((vec![5], params_tensor(params)))
            .map_err(|e| AppError::Synthesis(format!("Failed to create params tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| AppError::Synthesis("Synthesis session is poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![
                input_value,
                lengths_value,
                reference_value,
                params_value
            ])
            .map_err(|e| AppError::Synthesis(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get("waveform")
            .or_else(|| outputs.get("output"))
            .ok_or_else(|| AppError::Synthesis("Missing output tensor".to_string()))?;

        let output_view = output
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::Synthesis(format!("Failed to extract output tensor: {}", e)))?;

        Ok(Waveform {
            samples: output_view.1.iter().copied().collect(),
            sample_rate,
        })
    }
}

fn params_tensor(params: &SynthesisParameters) -> Vec<f32> {
    vec![
        params.speed,
        params.denoise,
        params.alpha,
        if params.avg_style { 1.0 } else { 0.0 },
        if params.stabilize { 1.0 } else { 0.0 },
    ]
}

/// Map a phoneme string to model token ids, framed by BOS/EOS.
pub fn phonemes_to_ids(phonemes: &str, id_map: &HashMap<String, Vec<i64>>) -> Vec<i64> {
    let mut ids = Vec::new();

    match id_map.get("^") {
        Some(bos) => ids.extend(bos),
        None => ids.push(0),
    }

    for ch in phonemes.chars() {
        let ch_str = ch.to_string();
        match id_map.get(&ch_str) {
            Some(mapped) => ids.extend(mapped),
            None => tracing::debug!("Dropping unmapped phoneme {:?}", ch),
        }
        if let Some(pad) = id_map.get("_") {
            ids.extend(pad);
        }
    }

    match id_map.get("$") {
        Some(eos) => ids.extend(eos),
        None => ids.push(0),
    }

    ids
}

/// Decode a reference WAV to mono f32 samples.
pub fn read_reference_audio(path: &Path) -> Result<Vec<f32>, AppError> {
    let reader = WavReader::open(path).map_err(|e| {
        AppError::Synthesis(format!(
            "Failed to open reference audio {}: {}",
            path.display(),
            e
        ))
    })?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, hound::Error>>(),
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<f32>, hound::Error>>()
        }
    }
    .map_err(|e| {
        AppError::Synthesis(format!(
            "Failed to decode reference audio {}: {}",
            path.display(),
            e
        ))
    })?;

    let channels = spec.channels.max(1) as usize;
    if channels == 1 {
        return Ok(samples);
    }

    Ok(samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect())
}
