use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::tts::synthesis::Waveform;
use crate::tts::InputType;

/// Generated audio, one file per input type.
///
/// Each write goes to a temporary file in the samples directory and is then
/// renamed over `output_<type>.wav`, so readers see either the previous file
/// or the new one, never a partial write.
pub struct OutputStore {
    samples_dir: PathBuf,
    locks: [Mutex<()>; 3],
}

impl OutputStore {
    /// Open the store, creating the samples directory if needed.
    pub fn new(samples_dir: PathBuf) -> Result<Self, AppError> {
        std::fs::create_dir_all(&samples_dir).map_err(|e| {
            AppError::Storage(format!(
                "Failed to create samples directory {}: {}",
                samples_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            samples_dir,
            locks: [Mutex::new(()), Mutex::new(()), Mutex::new(())],
        })
    }

    pub fn filename_for(input_type: InputType) -> String {
        format!("output_{}.wav", input_type)
    }

    pub async fn persist(
        &self,
        waveform: Waveform,
        input_type: InputType,
    ) -> Result<String, AppError> {
        let filename = Self::filename_for(input_type);
        let target = self.samples_dir.join(&filename);
        let dir = self.samples_dir.clone();

        let _guard = self.locks[input_type.index()].lock().await;
        tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &waveform))
            .await
            .map_err(|e| AppError::Storage(format!("Write task failed: {}", e)))??;

        Ok(filename)
    }

    /// Bytes of a previously stored file. Only the `output_<type>.wav`
    /// names are served; temporary files from in-flight writes are not.
    pub async fn open(&self, filename: &str) -> Result<Vec<u8>, AppError> {
        let not_found = || AppError::NotFound("File not found".to_string());
        let known = InputType::ALL
            .iter()
            .any(|t| Self::filename_for(*t) == filename);
        if !known {
            return Err(not_found());
        }

        match tokio::fs::read(self.samples_dir.join(filename)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

fn write_atomically(dir: &Path, target: &Path, waveform: &Waveform) -> Result<(), AppError> {
    let storage = |e: String| {
        AppError::Storage(format!("Failed to write {}: {}", target.display(), e))
    };

    let tmp = NamedTempFile::new_in(dir).map_err(|e| storage(e.to_string()))?;
    {
        let spec = WavSpec {
            channels: 1,
            sample_rate: waveform.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::new(BufWriter::new(tmp.as_file()), spec)
            .map_err(|e| storage(e.to_string()))?;
        for sample in &waveform.samples {
            let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(scaled).map_err(|e| storage(e.to_string()))?;
        }
        writer.finalize().map_err(|e| storage(e.to_string()))?;
    }
    tmp.as_file().sync_all().map_err(|e| storage(e.to_string()))?;
    tmp.persist(target).map_err(|e| storage(e.error.to_string()))?;

    Ok(())
}
