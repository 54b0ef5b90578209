use crate::audio::wav::f32_to_pcm16_bytes;
use crate::transcribe::client::TranscribeConfig;
use crate::{NatterError, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

/// How long `finish` waits for the final transcript after sending stop
const FINAL_TRANSCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Client-to-server control frames on the streaming socket
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlFrame {
    Start {
        sample_rate_hz: u32,
        language_code: String,
    },
    Stop,
}

/// Server-to-client frames on the streaming socket
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Partial { text: String },
    Final { text: String },
    Error { message: String },
}

/// Transcription progress surfaced while a stream is open
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Partial(String),
    Final(String),
    Error(String),
    Closed,
}

/// Live transcription session over a WebSocket.
///
/// Audio goes out as little-endian 16-bit PCM binary frames between a JSON
/// start frame and a JSON stop frame; transcripts come back as JSON text
/// frames.
pub struct StreamingTranscriber {
    sink: WsSink,
    source: WsSource,
    final_text: Option<String>,
}

impl StreamingTranscriber {
    /// Open the socket and announce the audio format
    pub async fn connect(config: &TranscribeConfig) -> Result<Self> {
        let url = config.stream_url();
        debug!("Connecting to streaming transcription at {}", url);

        let (ws, _response) = connect_async(&url)
            .await
            .map_err(|e| NatterError::TranscribeError(format!("Stream connect failed: {}", e)))?;

        let (sink, source) = ws.split();
        let mut transcriber = Self {
            sink,
            source,
            final_text: None,
        };

        transcriber
            .send_control(&ControlFrame::Start {
                sample_rate_hz: config.sample_rate_hz,
                language_code: config.language_code.clone(),
            })
            .await?;

        info!("Streaming transcription session open");
        Ok(transcriber)
    }

    async fn send_control(&mut self, frame: &ControlFrame) -> Result<()> {
        let json = serde_json::to_string(frame)
            .map_err(|e| NatterError::TranscribeError(format!("Failed to encode control frame: {}", e)))?;

        self.sink
            .send(Message::Text(json))
            .await
            .map_err(|e| NatterError::TranscribeError(format!("Stream send failed: {}", e)))
    }

    /// Forward captured samples as a binary PCM frame
    pub async fn send_audio(&mut self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let bytes = f32_to_pcm16_bytes(samples);
        self.sink
            .send(Message::Binary(bytes))
            .await
            .map_err(|e| NatterError::TranscribeError(format!("Stream send failed: {}", e)))
    }

    /// Check for a server frame, waiting at most `wait`.
    ///
    /// Returns None when nothing arrived in time.
    pub async fn try_next_event(&mut self, wait: Duration) -> Result<Option<StreamEvent>> {
        match tokio::time::timeout(wait, self.source.next()).await {
            Err(_) => Ok(None),
            Ok(None) => Ok(Some(StreamEvent::Closed)),
            Ok(Some(Err(e))) => Err(NatterError::TranscribeError(format!(
                "Stream receive failed: {}",
                e
            ))),
            Ok(Some(Ok(message))) => self.handle_message(message),
        }
    }

    fn handle_message(&mut self, message: Message) -> Result<Option<StreamEvent>> {
        match message {
            Message::Text(text) => {
                let frame: ServerFrame = serde_json::from_str(&text)
                    .map_err(|e| NatterError::TranscribeError(format!("Invalid server frame: {}", e)))?;

                Ok(Some(match frame {
                    ServerFrame::Partial { text } => StreamEvent::Partial(text),
                    ServerFrame::Final { text } => {
                        self.final_text = Some(text.clone());
                        StreamEvent::Final(text)
                    }
                    ServerFrame::Error { message } => StreamEvent::Error(message),
                }))
            }
            Message::Close(_) => Ok(Some(StreamEvent::Closed)),
            // Pings are answered by the transport; other frames carry nothing
            _ => Ok(None),
        }
    }

    /// Send the stop frame and wait for the final transcript
    pub async fn finish(mut self) -> Result<String> {
        self.send_control(&ControlFrame::Stop).await?;

        let deadline = Instant::now() + FINAL_TRANSCRIPT_TIMEOUT;

        loop {
            if let Some(text) = self.final_text.take() {
                let _ = self.sink.send(Message::Close(None)).await;
                return Ok(text);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(NatterError::TranscribeError(
                    "Timed out waiting for the final transcript".into(),
                ));
            }

            match self
                .try_next_event(remaining.min(Duration::from_millis(250)))
                .await?
            {
                Some(StreamEvent::Final(text)) => {
                    self.final_text = None;
                    let _ = self.sink.send(Message::Close(None)).await;
                    return Ok(text);
                }
                Some(StreamEvent::Error(message)) => {
                    return Err(NatterError::TranscribeError(format!(
                        "Streaming transcription failed: {}",
                        message
                    )));
                }
                Some(StreamEvent::Closed) => {
                    return Err(NatterError::TranscribeError(
                        "Stream closed before the final transcript".into(),
                    ));
                }
                Some(StreamEvent::Partial(_)) | None => continue,
            }
        }
    }
}
