//! Text-to-speech (TTS) synthesis client

use async_trait::async_trait;

use crate::language::Language;
use crate::{Error, Result};

/// Synthesis seam the orchestrator depends on
#[async_trait]
pub trait Synthesize: Send + Sync {
    /// Synthesize reply text to audio bytes (MP3)
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>>;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug)]
enum TtsProvider {
    OpenAI,
    Azure,
}

/// Synthesizes the tutor reply into spoken audio
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    region: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: String, model: String, voice: String, speed: f32) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            region: String::new(),
            provider: TtsProvider::OpenAI,
        })
    }

    /// Create a new TTS instance using Azure Cognitive Services
    ///
    /// # Errors
    ///
    /// Returns error if API key or region is missing
    pub fn new_azure(api_key: String, region: String, voice: String) -> Result<Self> {
        if api_key.is_empty() || region.is_empty() {
            return Err(Error::Config(
                "Azure TTS key and region required".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed: 1.0,
            model: String::new(),
            region,
            provider: TtsProvider::Azure,
        })
    }

    /// Synthesize using OpenAI TTS
    ///
    /// The multilingual voices speak the input language directly, so no
    /// locale parameter is sent.
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using Azure Cognitive Services TTS
    async fn synthesize_azure(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        let url = format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            self.region
        );

        let ssml = format!(
            "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{lang}'>\
<voice name='{voice}'>{text}</voice></speak>",
            lang = language.bcp47(),
            voice = self.voice,
            text = escape_xml(text),
        );

        let response = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", "audio-16khz-32kbitrate-mono-mp3")
            .body(ssml)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("Azure TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesize for TextToSpeech {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text).await,
            TtsProvider::Azure => self.synthesize_azure(text, language).await,
        }
    }
}

/// Escape text for embedding in an SSML body
fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
