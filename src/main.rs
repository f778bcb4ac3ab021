use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aria::adapter::{ConsoleAdapter, IoAdapter, LocalAudioAdapter};
use aria::api::ApiServerBuilder;
use aria::dialogue::{self, CompletionService, DialogueEngine, UnconfiguredService};
use aria::session::{SessionFactory, SessionOrchestrator, SessionTable};
use aria::voice::{
    AudioCapture, AudioPlayback, ResponseSynthesizer, SpeechSynthesizer, SpeechToText,
    TextToSpeech, calculate_energy,
};
use aria::Config;

/// ARIA - voice-activated conversational assistant
#[derive(Parser)]
#[command(name = "aria", version, about)]
struct Cli {
    /// Wake word or phrase (e.g. "aria")
    #[arg(short, long, env = "ARIA_WAKE_WORD")]
    wake_word: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen on the local microphone (default)
    Listen,
    /// Converse over stdin and stdout
    Text,
    /// Serve the web API and browser UI
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "A.R.I.A. systems online. This is a test of the speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,aria=info",
        1 => "info,aria=debug",
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
    let mut config = Config::load()?;
    if let Some(wake_word) = cli.wake_word {
        config.session.wake_word = wake_word.trim().to_string();
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Listen) {
        Command::Listen => listen(&config).await,
        Command::Text => text(&config).await,
        Command::Serve { port } => serve(&config, port).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker().await,
        Command::TestTts { text } => test_tts(&config, &text).await,
    }
}

/// Completion service for the configured provider, or one that always
/// fails when no key is set so sessions still answer with an apology
fn completion_service(config: &Config) -> (Arc<dyn CompletionService>, bool) {
    match dialogue::completion_service(&config.llm, &config.api_keys) {
        Ok(service) => (service, true),
        Err(e) => {
            tracing::warn!(
                error = %e,
                provider = %config.llm.provider,
                "language service not configured"
            );
            (Arc::new(UnconfiguredService), false)
        }
    }
}

/// Speech synthesis for local playback; text only when unavailable
fn response_synthesizer(config: &Config) -> ResponseSynthesizer {
    match TextToSpeech::from_config(&config.voice, &config.api_keys) {
        Ok(tts) => ResponseSynthesizer::new(Arc::new(tts), config.session.synthesis_timeout),
        Err(e) => {
            tracing::warn!(error = %e, "speech synthesis unavailable, replies will be text only");
            ResponseSynthesizer::text_only()
        }
    }
}

fn orchestrator(
    config: &Config,
    synthesizer: ResponseSynthesizer,
) -> anyhow::Result<SessionOrchestrator> {
    let settings = Arc::new(config.session_settings());
    let (service, _) = completion_service(config);
    let dialogue = DialogueEngine::from_settings(service, &settings);
    Ok(SessionOrchestrator::new("local", settings, dialogue, synthesizer)?)
}

/// Drive a session until it exits or Ctrl-C interrupts it
async fn converse<A>(orchestrator: &mut SessionOrchestrator, adapter: &mut A) -> aria::Result<()>
where
    A: IoAdapter,
{
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    orchestrator.run_until(adapter, ctrl_c).await
}

/// Local microphone loop
async fn listen(config: &Config) -> anyhow::Result<()> {
    let recognizer = SpeechToText::from_config(&config.voice, &config.api_keys)?;
    let mut adapter = LocalAudioAdapter::open(
        Arc::new(recognizer),
        config.session.persona.name.clone(),
        config.voice.recognition_failure_limit,
    )?;
    let mut orchestrator = orchestrator(config, response_synthesizer(config))?;

    tracing::info!("aria ready - say \"{}\"", config.session.wake_word);
    converse(&mut orchestrator, &mut adapter).await?;
    Ok(())
}

/// Console loop over stdin and stdout
async fn text(config: &Config) -> anyhow::Result<()> {
    let mut adapter = ConsoleAdapter::stdio(config.session.persona.name.clone());
    let mut orchestrator = orchestrator(config, ResponseSynthesizer::text_only())?;

    converse(&mut orchestrator, &mut adapter).await?;
    Ok(())
}

/// Web mode
async fn serve(config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    let (service, configured) = completion_service(config);
    let factory = SessionFactory::new(
        Arc::new(config.session_settings()),
        service,
        ResponseSynthesizer::text_only(),
    );
    let sessions = SessionTable::new(factory, config.server.session_idle_timeout);

    let server = ApiServerBuilder::new(sessions, port.unwrap_or(config.server.port))
        .llm(config.llm.provider.to_string(), config.llm.model.clone(), configured)
        .static_dir(config.server.static_dir.clone())
        .build();

    server.run().await?;
    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24000_u16;
    let frequency = 440.0_f32;
    let num_samples = usize::from(sample_rate) * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / f32::from(sample_rate);
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    playback.play(samples).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = TextToSpeech::from_config(&config.voice, &config.api_keys)?;

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    let playback = AudioPlayback::new()?;
    playback.play_mp3(mp3_data).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
