use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use crate::error::AppError;
use crate::tts::InputType;

/// Adds vowel and stress marks to unvocalized Hebrew text.
pub trait Diacritizer: Send + Sync {
    fn diacritize(&self, text: &str) -> Result<String, AppError>;
}

/// Converts diacritized Hebrew text into the phoneme string the synthesis model consumes.
pub trait Phonemizer: Send + Sync {
    fn phonemize(&self, vocalized: &str) -> Result<String, AppError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonemizationResult {
    pub phonemes: String,
    /// Present only when the input was Hebrew text rather than phonemes.
    pub vocalized_text: Option<String>,
}

/// Dispatches input text to the diacritizer and phonemizer according to its input type.
#[derive(Clone)]
pub struct PhonemizationAdapter {
    diacritizer: Arc<dyn Diacritizer>,
    phonemizer: Arc<dyn Phonemizer>,
}

impl PhonemizationAdapter {
    pub fn new(diacritizer: Arc<dyn Diacritizer>, phonemizer: Arc<dyn Phonemizer>) -> Self {
        Self {
            diacritizer,
            phonemizer,
        }
    }

    pub fn phonemize(
        &self,
        text: &str,
        input_type: InputType,
    ) -> Result<PhonemizationResult, AppError> {
        match input_type {
            InputType::Phonemes => Ok(PhonemizationResult {
                phonemes: text.to_string(),
                vocalized_text: None,
            }),
            InputType::Unvocalized => {
                let vocalized = self
                    .diacritizer
                    .diacritize(text)
                    .map_err(into_phonemization)?;
                let phonemes = self
                    .phonemizer
                    .phonemize(&vocalized)
                    .map_err(into_phonemization)?;
                Ok(PhonemizationResult {
                    phonemes,
                    vocalized_text: Some(vocalized),
                })
            }
            InputType::Vocalized => {
                let phonemes = self
                    .phonemizer
                    .phonemize(text)
                    .map_err(into_phonemization)?;
                Ok(PhonemizationResult {
                    phonemes,
                    vocalized_text: Some(text.to_string()),
                })
            }
        }
    }
}

fn into_phonemization(err: AppError) -> AppError {
    match err {
        AppError::Phonemization(msg) => AppError::Phonemization(msg),
        other => AppError::Phonemization(other.to_string()),
    }
}

/// An external program that reads text on stdin and writes its result to stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    /// Split a command line such as `phonikud --model m.onnx` on whitespace.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, input: &str) -> Result<String, AppError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AppError::Phonemization(format!(
                    "Failed to run {} (is it installed?): {}",
                    self.program, e
                ))
            })?;

        // Feed stdin from its own thread so a child that writes while it
        // reads cannot fill the stdout pipe and block both sides.
        let writer = child.stdin.take().map(|mut stdin| {
            let mut payload = input.to_string();
            if !payload.ends_with('\n') {
                payload.push('\n');
            }
            std::thread::spawn(move || stdin.write_all(payload.as_bytes()))
        });

        let output = child.wait_with_output().map_err(|e| {
            AppError::Phonemization(format!("Failed to wait for {}: {}", self.program, e))
        })?;

        let written = match writer {
            Some(handle) => handle.join().map_err(|_| {
                AppError::Phonemization(format!("Writer thread for {} panicked", self.program))
            })?,
            None => Ok(()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Phonemization(format!(
                "{} failed: {}",
                self.program,
                stderr.trim()
            )));
        }

        written.map_err(|e| {
            AppError::Phonemization(format!("Failed to write to {}: {}", self.program, e))
        })?;

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

pub struct CommandDiacritizer {
    command: ExternalCommand,
}

impl CommandDiacritizer {
    pub fn new(command: ExternalCommand) -> Self {
        Self { command }
    }
}

impl Diacritizer for CommandDiacritizer {
    fn diacritize(&self, text: &str) -> Result<String, AppError> {
        self.command.run(text)
    }
}

pub struct CommandPhonemizer {
    command: ExternalCommand,
}

impl CommandPhonemizer {
    pub fn new(command: ExternalCommand) -> Self {
        Self { command }
    }
}

impl Phonemizer for CommandPhonemizer {
    fn phonemize(&self, vocalized: &str) -> Result<String, AppError> {
        if vocalized.is_empty() {
            return Ok(String::new());
        }
        self.command.run(vocalized)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const NIKUD: &str = "\u{05B8}";

    /// Appends a qamats after every Hebrew letter and counts calls.
    #[derive(Default)]
    pub(crate) struct FakeDiacritizer {
        pub calls: AtomicUsize,
    }

    impl Diacritizer for FakeDiacritizer {
        fn diacritize(&self, text: &str) -> Result<String, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text
                .chars()
                .flat_map(|c| {
                    if ('\u{05D0}'..='\u{05EA}').contains(&c) {
                        vec![c, '\u{05B8}']
                    } else {
                        vec![c]
                    }
                })
                .collect())
        }
    }

    /// Emits the character count between slashes and counts calls.
    #[derive(Default)]
    pub(crate) struct FakePhonemizer {
        pub calls: AtomicUsize,
    }

    impl Phonemizer for FakePhonemizer {
        fn phonemize(&self, vocalized: &str) -> Result<String, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("/{}/", vocalized.chars().count()))
        }
    }

    struct BrokenDiacritizer;

    impl Diacritizer for BrokenDiacritizer {
        fn diacritize(&self, _text: &str) -> Result<String, AppError> {
            Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "onnx session crashed",
            )))
        }
    }

    fn adapter() -> (
        PhonemizationAdapter,
        Arc<FakeDiacritizer>,
        Arc<FakePhonemizer>,
    ) {
        let diacritizer = Arc::new(FakeDiacritizer::default());
        let phonemizer = Arc::new(FakePhonemizer::default());
        (
            PhonemizationAdapter::new(diacritizer.clone(), phonemizer.clone()),
            diacritizer,
            phonemizer,
        )
    }

    #[test]
    fn test_phonemes_passthrough() {
        let (adapter, diacritizer, phonemizer) = adapter();
        let result = adapter.phonemize("ʃalˈom", InputType::Phonemes).unwrap();

        assert_eq!(result.phonemes, "ʃalˈom");
        assert_eq!(result.vocalized_text, None);
        assert_eq!(diacritizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(phonemizer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unvocalized_is_diacritized_then_phonemized() {
        let (adapter, diacritizer, phonemizer) = adapter();
        let result = adapter.phonemize("שלום", InputType::Unvocalized).unwrap();

        let expected_vocalized = FakeDiacritizer::default().diacritize("שלום").unwrap();
        let expected_phonemes = FakePhonemizer::default()
            .phonemize(&expected_vocalized)
            .unwrap();

        assert_eq!(result.vocalized_text.as_deref(), Some(expected_vocalized.as_str()));
        assert_eq!(result.phonemes, expected_phonemes);
        assert!(result.vocalized_text.unwrap().contains(NIKUD));
        assert_eq!(diacritizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(phonemizer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_vocalized_is_echoed() {
        let (adapter, diacritizer, _) = adapter();
        let text = "שָׁלוֹם";
        let result = adapter.phonemize(text, InputType::Vocalized).unwrap();

        assert_eq!(result.vocalized_text.as_deref(), Some(text));
        assert_eq!(diacritizer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_collaborator_failure_becomes_phonemization_error() {
        let adapter = PhonemizationAdapter::new(
            Arc::new(BrokenDiacritizer),
            Arc::new(FakePhonemizer::default()),
        );
        let err = adapter
            .phonemize("שלום", InputType::Unvocalized)
            .unwrap_err();

        match err {
            AppError::Phonemization(msg) => assert!(msg.contains("onnx session crashed")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_command_line() {
        let cmd = ExternalCommand::parse("phonikud  --model m.onnx").unwrap();
        assert_eq!(cmd.program(), "phonikud");
        assert_eq!(cmd.args, vec!["--model", "m.onnx"]);
        assert!(ExternalCommand::parse("   ").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_roundtrips_stdin() {
        let phonemizer = CommandPhonemizer::new(ExternalCommand::parse("cat").unwrap());
        assert_eq!(phonemizer.phonemize("שָׁלוֹם").unwrap(), "שָׁלוֹם");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_streams_large_input() {
        let text = "שָׁלוֹם ".repeat(100_000);
        let expected = text.trim().to_string();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let phonemizer = CommandPhonemizer::new(ExternalCommand::parse("cat").unwrap());
            let _ = tx.send(phonemizer.phonemize(&text));
        });

        let output = rx
            .recv_timeout(std::time::Duration::from_secs(30))
            .expect("phonemizer did not finish within 30s")
            .unwrap();
        assert!(output.len() > 1_000_000);
        assert_eq!(output, expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_nonzero_exit() {
        let diacritizer = CommandDiacritizer::new(ExternalCommand::parse("false").unwrap());
        let err = diacritizer.diacritize("x").unwrap_err();
        assert!(matches!(err, AppError::Phonemization(_)));
    }

    #[test]
    fn test_missing_program() {
        let diacritizer = CommandDiacritizer::new(
            ExternalCommand::parse("definitely-not-a-real-diacritizer").unwrap(),
        );
        match diacritizer.diacritize("שלום").unwrap_err() {
            AppError::Phonemization(msg) => {
                assert!(msg.contains("definitely-not-a-real-diacritizer"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
