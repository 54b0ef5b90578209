//! End-to-end exchange tests against mock cloud services.
//!
//! One axum server stands in for staging, transcription, answer, and
//! synthesis; the session worker talks to it exactly as it would talk to
//! the real services.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use natter::messages::Role;
use natter::session::{Session, SessionCommand, SessionConfig, SessionEvent, SessionHandle};
use natter::transcribe::JobStatus;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, PartialEq)]
enum JobScript {
    /// PENDING, IN_PROGRESS, then COMPLETED with a transcript
    Complete,
    /// PENDING, then FAILED
    Fail,
    /// PENDING forever
    Stall,
}

#[derive(Clone)]
struct MockScript {
    job: JobScript,
    transcript: String,
    answer: String,
    fail_answer: bool,
}

impl MockScript {
    fn completing(transcript: &str, answer: &str) -> Self {
        Self {
            job: JobScript::Complete,
            transcript: transcript.to_string(),
            answer: answer.to_string(),
            fail_answer: false,
        }
    }
}

#[derive(Clone)]
struct MockState {
    base_url: String,
    script: Arc<MockScript>,
    polls: Arc<Mutex<HashMap<String, usize>>>,
    uploads: Arc<Mutex<Vec<String>>>,
    deletes: Arc<Mutex<Vec<String>>>,
}

struct MockServer {
    base_url: String,
    uploads: Arc<Mutex<Vec<String>>>,
    deletes: Arc<Mutex<Vec<String>>>,
}

async fn spawn_mock(script: MockScript) -> MockServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let uploads = Arc::new(Mutex::new(Vec::new()));
    let deletes = Arc::new(Mutex::new(Vec::new()));

    let state = MockState {
        base_url: base_url.clone(),
        script: Arc::new(script),
        polls: Arc::new(Mutex::new(HashMap::new())),
        uploads: Arc::clone(&uploads),
        deletes: Arc::clone(&deletes),
    };

    let app = Router::new()
        .route("/media/{key}", put(put_media))
        .route("/v1/transcriptions", post(start_job))
        .route("/v1/transcriptions/{name}", get(get_job).delete(delete_job))
        .route("/v1/transcriptions/{name}/transcript", get(get_transcript))
        .route("/v1/chat/completions", post(chat_completion))
        .route("/v1/speech", post(synthesize))
        .route("/v1/stream", get(stream_socket))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        base_url,
        uploads,
        deletes,
    }
}

async fn put_media(
    State(state): State<MockState>,
    Path(key): Path<String>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    assert!(!body.is_empty());
    state.uploads.lock().unwrap().push(key.clone());
    (
        StatusCode::CREATED,
        Json(json!({ "uri": format!("mock://media/{}", key) })),
    )
}

async fn start_job(Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    let name = body["job_name"].as_str().unwrap_or("unknown").to_string();
    Json(json!({
        "job_name": name,
        "status": "PENDING",
        "media_uri": body["media_uri"],
        "created_at": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn get_job(State(state): State<MockState>, Path(name): Path<String>) -> impl IntoResponse {
    let poll_count = {
        let mut polls = state.polls.lock().unwrap();
        let count = polls.entry(name.clone()).or_insert(0);
        *count += 1;
        *count
    };

    let (status, transcript_uri, failure_reason) = match state.script.job {
        JobScript::Stall => ("PENDING", None, None),
        JobScript::Fail => {
            if poll_count == 1 {
                ("PENDING", None, None)
            } else {
                ("FAILED", None, Some("audio quality too low".to_string()))
            }
        }
        JobScript::Complete => match poll_count {
            1 => ("PENDING", None, None),
            2 => ("IN_PROGRESS", None, None),
            _ => (
                "COMPLETED",
                Some(format!("{}/v1/transcriptions/{}/transcript", state.base_url, name)),
                None,
            ),
        },
    };

    Json(json!({
        "job_name": name,
        "status": status,
        "media_uri": format!("mock://media/{}", name),
        "transcript_uri": transcript_uri,
        "failure_reason": failure_reason,
        "created_at": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn get_transcript(
    State(state): State<MockState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    Json(json!({
        "job_name": name,
        "language_code": "en-US",
        "text": state.script.transcript,
    }))
}

async fn delete_job(State(state): State<MockState>, Path(name): Path<String>) -> impl IntoResponse {
    state.deletes.lock().unwrap().push(name);
    StatusCode::NO_CONTENT
}

async fn chat_completion(State(state): State<MockState>) -> axum::response::Response {
    if state.script.fail_answer {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    } else {
        Json(json!({
            "choices": [
                { "message": { "role": "assistant", "content": state.script.answer } }
            ]
        }))
        .into_response()
    }
}

async fn synthesize() -> impl IntoResponse {
    // 0.1s of silence at 22050 Hz, 16-bit
    vec![0u8; 4410]
}

async fn stream_socket(ws: WebSocketUpgrade, State(state): State<MockState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_stream(socket, state))
}

async fn run_stream(mut socket: WebSocket, state: MockState) {
    let mut sent_partial = false;

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            WsMessage::Text(text) => {
                let frame: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                match frame["type"].as_str() {
                    Some("start") => {
                        assert_eq!(frame["sample_rate_hz"], 16000);
                    }
                    Some("stop") => {
                        let final_frame =
                            json!({ "type": "final", "text": state.script.transcript });
                        let _ = socket
                            .send(WsMessage::Text(final_frame.to_string().into()))
                            .await;
                        let _ = socket.send(WsMessage::Close(None)).await;
                        break;
                    }
                    _ => {}
                }
            }
            WsMessage::Binary(_) => {
                if !sent_partial {
                    sent_partial = true;
                    let partial = json!({ "type": "partial", "text": "what is" });
                    let _ = socket
                        .send(WsMessage::Text(partial.to_string().into()))
                        .await;
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }
}

fn mock_config(base_url: &str) -> SessionConfig {
    let mut config = SessionConfig::default()
        .without_audio_input()
        .without_audio_output();

    config.staging.base_url = base_url.to_string();
    config.transcribe.base_url = base_url.to_string();
    config.answer.base_url = base_url.to_string();
    config.speech.base_url = base_url.to_string();

    config.poll.interval_ms = 10;
    config.poll.backoff = 1.0;
    config.poll.max_interval_ms = 10;
    config.poll.max_wait_secs = 5;
    config
}

async fn collect_until<F>(
    handle: &SessionHandle,
    events: &mut Vec<SessionEvent>,
    mut done: F,
) -> bool
where
    F: FnMut(&[SessionEvent]) -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        while let Some(event) = handle.try_recv_event() {
            events.push(event);
        }
        if done(events.as_slice()) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn assistant_turn_added(events: &[SessionEvent]) -> bool {
    events
        .iter()
        .any(|e| matches!(e, SessionEvent::TurnAdded(turn) if turn.role == Role::Assistant))
}

fn push_tone(handle: &SessionHandle, seconds: f32) {
    let total = (16000.0 * seconds) as usize;
    let sender = handle.audio_sender();
    for start in (0..total).step_by(1600) {
        let chunk: Vec<f32> = (start..(start + 1600).min(total))
            .map(|i| (i as f32 * 0.05).sin() * 0.4)
            .collect();
        sender.send(chunk).unwrap();
    }
}

fn shutdown(handle: &SessionHandle, worker: thread::JoinHandle<()>) {
    let _ = handle.send_command(SessionCommand::Shutdown);
    let _ = worker.join();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_batch_exchange_happy_path() {
    let mock = spawn_mock(MockScript::completing("what is the weather", "It is sunny.")).await;

    let (session, handle) = Session::new(mock_config(&mock.base_url)).unwrap();
    let worker = session.start().unwrap();

    handle.send_command(SessionCommand::StartRecording).unwrap();
    let mut events = Vec::new();
    assert!(
        collect_until(&handle, &mut events, |events| {
            events.iter().any(|e| matches!(e, SessionEvent::RecordingStarted))
        })
        .await
    );

    push_tone(&handle, 0.5);
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.send_command(SessionCommand::StopRecording).unwrap();
    assert!(collect_until(&handle, &mut events, assistant_turn_added).await);

    let turns = handle.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].text, "what is the weather");
    assert!(turns[0].meta.from_speech);
    assert!(turns[0].meta.transcribe_ms.is_some());
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].text, "It is sunny.");
    assert!(turns[1].meta.answer_ms.is_some());
    assert!(turns[1].meta.synthesis_ms.is_some());

    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::TranscriptReady(text) if text == "what is the weather")));
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::AnswerReady(text) if text == "It is sunny.")));
    assert!(events.iter().any(|e| matches!(e, SessionEvent::SpeechReady { .. })));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::Error(_))));

    let statuses: Vec<JobStatus> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::JobUpdate { status, .. } => Some(*status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses.first(), Some(&JobStatus::Pending));
    assert_eq!(statuses.last(), Some(&JobStatus::Completed));

    let uploads = mock.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].starts_with("natter-"));
    drop(uploads);

    // The finished job gets cleaned up
    assert_eq!(mock.deletes.lock().unwrap().len(), 1);

    shutdown(&handle, worker);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_job_speaks_apology() {
    let mock = spawn_mock(MockScript {
        job: JobScript::Fail,
        transcript: String::new(),
        answer: "unused".to_string(),
        fail_answer: false,
    })
    .await;

    let config = mock_config(&mock.base_url);
    let apology = config.apology_text.clone();

    let (session, handle) = Session::new(config).unwrap();
    let worker = session.start().unwrap();

    handle.send_command(SessionCommand::StartRecording).unwrap();
    let mut events = Vec::new();
    assert!(
        collect_until(&handle, &mut events, |events| {
            events.iter().any(|e| matches!(e, SessionEvent::RecordingStarted))
        })
        .await
    );

    push_tone(&handle, 0.3);
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.send_command(SessionCommand::StopRecording).unwrap();
    assert!(collect_until(&handle, &mut events, assistant_turn_added).await);

    // Only the apology turn: the user said something, but nothing was
    // understood, so no user turn is recorded
    let turns = handle.turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::Assistant);
    assert_eq!(turns[0].text, apology);

    assert!(events.iter().any(
        |e| matches!(e, SessionEvent::JobUpdate { status, .. } if *status == JobStatus::Failed)
    ));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::TranscriptReady(_))));

    // The apology is still synthesized
    assert!(events.iter().any(|e| matches!(e, SessionEvent::SpeechReady { .. })));

    shutdown(&handle, worker);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stalled_job_times_out() {
    let mock = spawn_mock(MockScript {
        job: JobScript::Stall,
        transcript: String::new(),
        answer: "unused".to_string(),
        fail_answer: false,
    })
    .await;

    let mut config = mock_config(&mock.base_url);
    config.poll.max_wait_secs = 1;
    let apology = config.apology_text.clone();

    let (session, handle) = Session::new(config).unwrap();
    let worker = session.start().unwrap();

    handle.send_command(SessionCommand::StartRecording).unwrap();
    let mut events = Vec::new();
    assert!(
        collect_until(&handle, &mut events, |events| {
            events.iter().any(|e| matches!(e, SessionEvent::RecordingStarted))
        })
        .await
    );

    push_tone(&handle, 0.3);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = std::time::Instant::now();
    handle.send_command(SessionCommand::StopRecording).unwrap();
    assert!(collect_until(&handle, &mut events, assistant_turn_added).await);

    // The poll gave up inside its budget instead of spinning forever
    assert!(started.elapsed() < Duration::from_secs(5));

    assert!(events.iter().any(|e| matches!(e, SessionEvent::Error(_))));
    let turns = handle.turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].text, apology);

    shutdown(&handle, worker);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_transcript_speaks_apology() {
    let mock = spawn_mock(MockScript::completing("   ", "unused")).await;

    let config = mock_config(&mock.base_url);
    let apology = config.apology_text.clone();

    let (session, handle) = Session::new(config).unwrap();
    let worker = session.start().unwrap();

    handle.send_command(SessionCommand::StartRecording).unwrap();
    let mut events = Vec::new();
    assert!(
        collect_until(&handle, &mut events, |events| {
            events.iter().any(|e| matches!(e, SessionEvent::RecordingStarted))
        })
        .await
    );

    push_tone(&handle, 0.3);
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.send_command(SessionCommand::StopRecording).unwrap();
    assert!(collect_until(&handle, &mut events, assistant_turn_added).await);

    // A whitespace-only transcript counts as hearing nothing
    let turns = handle.turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::Assistant);
    assert_eq!(turns[0].text, apology);
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::TranscriptReady(_))));

    shutdown(&handle, worker);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_streaming_exchange_round_trip() {
    let mock = spawn_mock(MockScript::completing("what is the weather", "It is sunny.")).await;

    let config = mock_config(&mock.base_url).with_streaming();
    let (session, handle) = Session::new(config).unwrap();
    let worker = session.start().unwrap();

    handle.send_command(SessionCommand::StartRecording).unwrap();
    let mut events = Vec::new();
    assert!(
        collect_until(&handle, &mut events, |events| {
            events.iter().any(|e| matches!(e, SessionEvent::RecordingStarted))
        })
        .await
    );

    push_tone(&handle, 0.5);

    // Give the worker time to forward audio and pick up the partial
    assert!(
        collect_until(&handle, &mut events, |events| {
            events.iter().any(|e| matches!(e, SessionEvent::PartialTranscript(_)))
        })
        .await
    );

    handle.send_command(SessionCommand::StopRecording).unwrap();
    assert!(collect_until(&handle, &mut events, assistant_turn_added).await);

    let turns = handle.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].text, "what is the weather");
    assert!(turns[0].meta.from_speech);
    assert_eq!(turns[1].text, "It is sunny.");

    // Streaming never touches the batch services
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::JobUpdate { .. })));
    assert!(mock.uploads.lock().unwrap().is_empty());

    shutdown(&handle, worker);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transcribe_file_runs_full_exchange() {
    let mock = spawn_mock(MockScript::completing("read from a file", "Noted.")).await;

    let (session, handle) = Session::new(mock_config(&mock.base_url)).unwrap();
    let worker = session.start().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("utterance.wav");
    let samples: Vec<f32> = (0..8000).map(|i| (i as f32 * 0.05).sin() * 0.4).collect();
    natter::audio::write_wav_file(&path, &samples, 16000).unwrap();

    handle
        .send_command(SessionCommand::TranscribeFile(path))
        .unwrap();

    let mut events = Vec::new();
    assert!(collect_until(&handle, &mut events, assistant_turn_added).await);

    let turns = handle.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].text, "read from a file");
    assert!(turns[0].meta.from_speech);
    assert_eq!(turns[1].text, "Noted.");

    assert_eq!(mock.uploads.lock().unwrap().len(), 1);

    shutdown(&handle, worker);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_answer_failure_reuses_apology() {
    let mock = spawn_mock(MockScript {
        job: JobScript::Complete,
        transcript: "unused".to_string(),
        answer: String::new(),
        fail_answer: true,
    })
    .await;

    let config = mock_config(&mock.base_url);
    let apology = config.apology_text.clone();

    let (session, handle) = Session::new(config).unwrap();
    let worker = session.start().unwrap();

    handle
        .send_command(SessionCommand::SendText("hello".to_string()))
        .unwrap();

    let mut events = Vec::new();
    assert!(collect_until(&handle, &mut events, assistant_turn_added).await);

    // The user turn stays; the assistant turn falls back to the apology
    let turns = handle.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].text, "hello");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].text, apology);

    assert!(events.iter().any(|e| matches!(e, SessionEvent::Error(_))));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::AnswerReady(_))));

    shutdown(&handle, worker);
}
