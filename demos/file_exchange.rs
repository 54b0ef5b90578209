use natter::messages::Role;
use natter::session::{Session, SessionCommand, SessionConfig, SessionEvent};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <wav-path> [config.toml]", args[0]);
        eprintln!("\nExample:");
        eprintln!("  cargo run --example file_exchange -- question.wav");
        std::process::exit(1);
    }

    let wav_path = PathBuf::from(&args[1]);

    let config = match args.get(2) {
        Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
        None => SessionConfig::default(),
    };
    let config = config.without_audio_input().without_audio_output();

    info!("Running one exchange for {:?}", wav_path);

    let (session, handle) = Session::new(config)?;
    let worker = session.start()?;

    handle.send_command(SessionCommand::TranscribeFile(wav_path))?;

    loop {
        match handle.try_recv_event() {
            Some(SessionEvent::JobUpdate { status, .. }) => {
                info!("Job status: {}", status.as_str());
            }
            Some(SessionEvent::TurnAdded(turn)) => {
                match turn.role {
                    Role::User => info!("Heard: '{}'", turn.text),
                    Role::Assistant => {
                        info!("Answer: '{}'", turn.text);
                        break;
                    }
                }
            }
            Some(SessionEvent::Error(message)) => eprintln!("Error: {}", message),
            Some(SessionEvent::Shutdown) => break,
            Some(_) => {}
            None => std::thread::sleep(Duration::from_millis(50)),
        }
    }

    handle.send_command(SessionCommand::Shutdown)?;
    let _ = worker.join();

    info!("Exchange complete");
    Ok(())
}
