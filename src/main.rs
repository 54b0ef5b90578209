use anyhow::{Context, Result};
#[cfg(feature = "audio-io")]
use natter::audio::AudioInput;
use natter::messages::Role;
use natter::session::{Session, SessionCommand, SessionConfig, SessionEvent, SessionHandle};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "natter=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting natter voice session");

    let mut config = load_config()?;

    #[cfg(not(feature = "audio-io"))]
    {
        config.enable_audio_input = false;
        config.enable_audio_output = false;
    }

    #[cfg(feature = "audio-io")]
    let mut audio_input: Option<AudioInput> = None;

    #[cfg(feature = "audio-io")]
    if config.enable_audio_input {
        match AudioInput::new() {
            Ok(input) => {
                // The worker needs to know the rate frames actually arrive at
                config.input_sample_rate = input.sample_rate();
                audio_input = Some(input);
            }
            Err(e) => {
                warn!("Audio input unavailable, text input only: {}", e);
                config.enable_audio_input = false;
            }
        }
    }

    let (session, handle) = Session::new(config)?;
    let worker = session.start()?;

    #[cfg(feature = "audio-io")]
    if let Some(input) = audio_input.as_mut() {
        input.start(handle.audio_sender())?;
    }

    let printer_handle = handle.clone();
    let printer = std::thread::spawn(move || print_events(printer_handle));

    println!("natter voice session");
    println!("  Enter        start/stop recording");
    println!("  :text <msg>  send typed text");
    println!("  :file <path> transcribe a WAV file");
    println!("  :clear       clear the conversation");
    println!("  :quit        exit");

    let mut recording = false;
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed == ":quit" || trimmed == ":q" {
            break;
        } else if trimmed == ":clear" {
            if !send(&handle, SessionCommand::ClearConversation) {
                break;
            }
        } else if let Some(text) = trimmed.strip_prefix(":text ") {
            if !send(&handle, SessionCommand::SendText(text.to_string())) {
                break;
            }
        } else if let Some(path) = trimmed.strip_prefix(":file ") {
            let path = PathBuf::from(path.trim());
            if !send(&handle, SessionCommand::TranscribeFile(path)) {
                break;
            }
        } else if trimmed.is_empty() {
            if recording {
                #[cfg(feature = "audio-io")]
                if let Some(input) = &audio_input {
                    input.disarm();
                }
                if !send(&handle, SessionCommand::StopRecording) {
                    break;
                }
                recording = false;
            } else {
                if !send(&handle, SessionCommand::StartRecording) {
                    break;
                }
                #[cfg(feature = "audio-io")]
                if let Some(input) = &audio_input {
                    input.arm();
                }
                recording = true;
            }
        } else {
            println!("Unrecognized input; use :text <msg> to chat by text");
        }
    }

    let _ = handle.send_command(SessionCommand::Shutdown);

    if worker.join().is_err() {
        warn!("Session worker panicked");
    }
    if printer.join().is_err() {
        warn!("Event printer panicked");
    }

    info!("Goodbye");
    Ok(())
}

fn load_config() -> Result<SessionConfig> {
    let mut args = std::env::args().skip(1);

    match args.next() {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path))?;
            let config = toml::from_str(&text)
                .with_context(|| format!("Failed to parse config file {}", path))?;
            info!("Loaded configuration from {}", path);
            Ok(config)
        }
        None => Ok(SessionConfig::default()),
    }
}

fn send(handle: &SessionHandle, command: SessionCommand) -> bool {
    match handle.send_command(command) {
        Ok(()) => true,
        Err(e) => {
            warn!("Session is no longer accepting commands: {}", e);
            false
        }
    }
}

fn print_events(handle: SessionHandle) {
    loop {
        match handle.try_recv_event() {
            Some(SessionEvent::RecordingStarted) => println!("* recording, press Enter to stop"),
            Some(SessionEvent::RecordingStopped) => println!("* processing"),
            Some(SessionEvent::RecordingCancelled) => println!("* recording cancelled"),
            Some(SessionEvent::JobUpdate { status, .. }) => {
                println!("* transcription {}", status.as_str().to_lowercase());
            }
            Some(SessionEvent::PartialTranscript(text)) => println!("  ~ {}", text),
            Some(SessionEvent::TurnAdded(turn)) => match turn.role {
                Role::User => println!("you: {}", turn.text),
                Role::Assistant => println!("assistant: {}", turn.text),
            },
            Some(SessionEvent::SpeechReady { duration_secs }) => {
                println!("* speaking ({:.1}s)", duration_secs);
            }
            Some(SessionEvent::Error(message)) => println!("! {}", message),
            Some(SessionEvent::Shutdown) => break,
            // Covered by the turn lines above
            Some(SessionEvent::TranscriptReady(_))
            | Some(SessionEvent::AnswerReady(_))
            | Some(SessionEvent::PlaybackStarted)
            | Some(SessionEvent::PlaybackComplete) => {}
            None => std::thread::sleep(Duration::from_millis(50)),
        }
    }
}
