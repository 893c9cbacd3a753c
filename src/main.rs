use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sat_tutor::voice::Synthesize;
use sat_tutor::{Config, Language, Orchestrator, QuestionBank};

/// SAT Tutor - voice-driven Reading & Writing tutoring session
#[derive(Parser)]
#[command(name = "sat-tutor", version, about)]
#[command(subcommand_negates_reqs = true, args_conflicts_with_subcommands = true)]
struct Cli {
    /// Path to the input audio file written by the front end
    #[arg(required = true)]
    input: Option<PathBuf>,

    /// Session output directory (reply audio, transcript, signal files)
    #[arg(required = true)]
    output: Option<PathBuf>,

    /// Tutoring language
    #[arg(short, long, env = "TUTOR_LANGUAGE", value_enum, default_value_t = Language::English)]
    language: Language,

    /// Question bank file (overrides config and TUTOR_BANK)
    #[arg(short, long)]
    bank: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the loaded question bank
    Questions {
        /// Question bank file (overrides config and TUTOR_BANK)
        #[arg(short, long)]
        bank: Option<PathBuf>,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,

        /// Where to write the synthesized audio
        #[arg(short, long, default_value = "tts-test.mp3")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,sat_tutor=info",
        1 => "info,sat_tutor=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let language = cli.language;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Questions { bank } => {
                let mut config = Config::load(PathBuf::new(), PathBuf::new(), language);
                if let Some(bank) = bank {
                    config.bank_path = bank;
                }
                print_questions(&config)
            }
            Command::TestTts { text, out } => {
                let config = Config::load(PathBuf::new(), PathBuf::new(), language);
                test_tts(&config, &text, &out).await
            }
        };
    }

    let (Some(input), Some(output)) = (cli.input, cli.output) else {
        anyhow::bail!("input audio file and output directory are required");
    };

    let mut config = Config::load(input, output, language);
    if let Some(bank) = cli.bank {
        config.bank_path = bank;
    }

    let orchestrator = Orchestrator::from_config(&config)?;
    orchestrator.run().await?;

    Ok(())
}

fn print_questions(config: &Config) -> anyhow::Result<()> {
    let bank = QuestionBank::load(&config.bank_path)?;
    for i in 1..=bank.len() {
        if let Some(q) = bank.get(i) {
            let category = q.sub_category.as_deref().unwrap_or("(classified at runtime)");
            println!("{i}. [{category}] {}", q.prompt.lines().next().unwrap_or(""));
        }
    }
    Ok(())
}

async fn test_tts(config: &Config, text: &str, out: &std::path::Path) -> anyhow::Result<()> {
    use sat_tutor::voice::TextToSpeech;

    let tts = if config.voice.tts_provider == "azure" {
        let key = config
            .api_keys
            .azure_tts
            .clone()
            .ok_or_else(|| anyhow::anyhow!("AZURE_TTS_KEY not set"))?;
        let region = config
            .api_keys
            .azure_tts_region
            .clone()
            .ok_or_else(|| anyhow::anyhow!("AZURE_TTS_REGION not set"))?;
        let voice = config
            .voice
            .tts_voice
            .clone()
            .unwrap_or_else(|| "en-US-AvaMultilingualNeural".to_string());
        TextToSpeech::new_azure(key, region, voice)?
    } else {
        let key = config
            .api_keys
            .openai
            .clone()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
        let voice = config
            .voice
            .tts_voice
            .clone()
            .unwrap_or_else(|| "alloy".to_string());
        TextToSpeech::new_openai(key, config.voice.tts_model.clone(), voice, config.voice.tts_speed)?
    };

    let audio = tts.synthesize(text, config.language).await?;
    std::fs::write(out, &audio)?;
    tracing::info!(path = %out.display(), bytes = audio.len(), "synthesized test audio");
    Ok(())
}
