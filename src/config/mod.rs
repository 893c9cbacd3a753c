//! Configuration management for the tutoring session

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::language::Language;
use crate::protocol::DEFAULT_POLL_INTERVAL;

/// Tutoring session configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the input audio artifact written by the front end
    pub input_path: PathBuf,

    /// Session output directory (reply audio, transcript, signals)
    pub output_dir: PathBuf,

    /// Tutoring language
    pub language: Language,

    /// Path to the question bank file
    pub bank_path: PathBuf,

    /// Input artifact polling interval
    pub poll_interval: Duration,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// LLM configuration
    pub llm: LlmConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Voice processing configuration
#[derive(Debug, Clone, Default)]
pub struct VoiceConfig {
    /// STT provider ("whisper" or "deepgram")
    /// Set via `TUTOR_STT_PROVIDER` env var
    pub stt_provider: String,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// TTS provider ("openai" or "azure")
    /// Set via `TUTOR_TTS_PROVIDER` env var
    pub tts_provider: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier; provider default when unset
    pub tts_voice: Option<String>,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

/// LLM configuration for classification and dialogue
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier for chat completions
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (completions, Whisper, TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// Azure Cognitive Services speech key (optional TTS)
    pub azure_tts: Option<String>,

    /// Azure speech resource region (e.g. "eastus")
    pub azure_tts_region: Option<String>,

    /// `Serper` API key (optional web search)
    pub serper: Option<String>,
}

impl Config {
    /// Load configuration for a session
    ///
    /// Every setting resolves env > toml > default; the caller supplies the
    /// session-specific paths and language from the command line.
    #[must_use]
    pub fn load(input_path: PathBuf, output_dir: PathBuf, language: Language) -> Self {
        // Load optional TOML config file (env > toml > default)
        let fc = file::load_config_file();

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok().or(fc.api_keys.openai),
            deepgram: std::env::var("DEEPGRAM_API_KEY")
                .ok()
                .or(fc.api_keys.deepgram),
            azure_tts: std::env::var("AZURE_TTS_KEY")
                .ok()
                .or(fc.api_keys.azure_tts),
            azure_tts_region: std::env::var("AZURE_TTS_REGION")
                .ok()
                .or(fc.api_keys.azure_tts_region),
            serper: std::env::var("SERPER_API_KEY").ok().or(fc.api_keys.serper),
        };

        // Default the TTS provider to Azure only when its credentials exist
        let default_tts_provider =
            if api_keys.azure_tts.is_some() && api_keys.azure_tts_region.is_some() {
                "azure"
            } else {
                "openai"
            };

        let voice = VoiceConfig {
            stt_provider: std::env::var("TUTOR_STT_PROVIDER")
                .ok()
                .or(fc.voice.stt_provider)
                .unwrap_or_else(|| "whisper".to_string()),
            stt_model: std::env::var("TUTOR_STT_MODEL")
                .ok()
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_provider: std::env::var("TUTOR_TTS_PROVIDER")
                .ok()
                .or(fc.voice.tts_provider)
                .unwrap_or_else(|| default_tts_provider.to_string()),
            tts_model: std::env::var("TUTOR_TTS_MODEL")
                .ok()
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: std::env::var("TUTOR_TTS_VOICE").ok().or(fc.voice.tts_voice),
            tts_speed: std::env::var("TUTOR_TTS_SPEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.voice.tts_speed)
                .unwrap_or(1.0),
        };

        let llm = LlmConfig {
            model: std::env::var("TUTOR_LLM_MODEL")
                .ok()
                .or(fc.llm.model)
                .unwrap_or_else(|| "gpt-4o".to_string()),
            temperature: std::env::var("TUTOR_LLM_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.llm.temperature)
                .unwrap_or(0.2),
        };

        let bank_path = std::env::var("TUTOR_BANK")
            .ok()
            .or(fc.bank.path)
            .map_or_else(|| PathBuf::from("banks/questions.txt"), PathBuf::from);

        let poll_interval = std::env::var("TUTOR_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(fc.session.poll_interval_ms)
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis);

        Self {
            input_path,
            output_dir,
            language,
            bank_path,
            poll_interval,
            voice,
            llm,
            api_keys,
        }
    }
}
