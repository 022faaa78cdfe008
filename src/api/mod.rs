pub mod handlers;
pub mod routes;

use serde::{Deserialize, Deserializer, Serialize};

use crate::tts::{GenerationRequest, GenerationResult, InputType};

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub input_type: Option<InputType>,
    /// Outer `None` when the field is absent, `Some(None)` for an explicit null.
    #[serde(default, deserialize_with = "present")]
    pub ref_audio: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub filename: String,
    pub phonemes: String,
    pub vocalized_text: Option<String>,
}

impl From<GenerationResult> for GenerateResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            success: true,
            filename: result.filename,
            phonemes: result.phonemes,
            vocalized_text: result.vocalized_text,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub voices: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Defaults an entry point fills in for fields the client left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPolicy {
    pub default_input_type: InputType,
    /// `None` means the client must name a reference voice.
    pub default_reference_voice: Option<String>,
}

impl RequestPolicy {
    /// `/api/tts/generate`: unvocalized text, default voice.
    pub fn api(default_voice: impl Into<String>) -> Self {
        Self {
            default_input_type: InputType::Unvocalized,
            default_reference_voice: Some(default_voice.into()),
        }
    }

    /// `/generate`: vocalized text, voice required.
    pub fn web_form() -> Self {
        Self {
            default_input_type: InputType::Vocalized,
            default_reference_voice: None,
        }
    }

    pub fn apply(&self, request: GenerateRequest) -> GenerationRequest {
        GenerationRequest {
            text: request.text.unwrap_or_default(),
            input_type: request.input_type.unwrap_or(self.default_input_type),
            // An explicit null is kept empty and fails validation.
            reference_voice: match request.ref_audio {
                Some(voice) => voice.unwrap_or_default(),
                None => self.default_reference_voice.clone().unwrap_or_default(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_policy_fills_defaults() {
        let request = RequestPolicy::api("10_michael.wav").apply(GenerateRequest {
            text: Some("שלום".into()),
            ..Default::default()
        });
        assert_eq!(request.input_type, InputType::Unvocalized);
        assert_eq!(request.reference_voice, "10_michael.wav");
    }

    #[test]
    fn test_web_form_policy_requires_voice() {
        let request = RequestPolicy::web_form().apply(GenerateRequest {
            text: Some("שָׁלוֹם".into()),
            ..Default::default()
        });
        assert_eq!(request.input_type, InputType::Vocalized);
        assert_eq!(request.reference_voice, "");
    }

    #[test]
    fn test_explicit_empty_voice_is_kept() {
        let request = RequestPolicy::api("10_michael.wav").apply(GenerateRequest {
            text: Some("שלום".into()),
            input_type: Some(InputType::Phonemes),
            ref_audio: Some(Some(String::new())),
        });
        assert_eq!(request.input_type, InputType::Phonemes);
        assert_eq!(request.reference_voice, "");
    }

    #[test]
    fn test_request_field_names() {
        let request: GenerateRequest = serde_json::from_str(
            r#"{"text": "שלום", "type": "vocalized", "ref_audio": "a.wav"}"#,
        )
        .unwrap();
        assert_eq!(request.input_type, Some(InputType::Vocalized));
        assert_eq!(request.ref_audio, Some(Some("a.wav".to_string())));
    }

    #[test]
    fn test_null_voice_does_not_take_default() {
        let request: GenerateRequest =
            serde_json::from_str(r#"{"text": "שלום", "ref_audio": null}"#).unwrap();
        assert_eq!(request.ref_audio, Some(None));

        let request = RequestPolicy::api("10_michael.wav").apply(request);
        assert_eq!(request.reference_voice, "");

        let absent: GenerateRequest = serde_json::from_str(r#"{"text": "שלום"}"#).unwrap();
        assert_eq!(absent.ref_audio, None);
    }
}
