use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::{Client, StatusCode};
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use serde::{Deserialize, Serialize};

use crate::error::AIError;
use crate::message::{Message, Role};
use crate::persona::Persona;
use crate::secrets::ApiKey;
use crate::settings::Settings;

/// Text increments of one reply, in delivery order. Ends when the model is done.
pub type FragmentStream = BoxStream<'static, Result<String, AIError>>;

/// One remote chat call per turn.
///
/// `history` is everything before the newest user entry; `message` is that
/// entry's text. Each call starts a fresh, stateless chat.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn send_message(
        &self,
        history: &[Message],
        message: &str,
    ) -> Result<FragmentStream, AIError>;
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GeminiClient {
    client: Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
    system_instruction: String,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct GeminiContent {
    pub role: Role,
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<StreamCandidate>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct StreamCandidate {
    content: Option<StreamContent>,
}

#[derive(Deserialize)]
struct StreamContent {
    #[serde(default)]
    parts: Vec<StreamPart>,
}

#[derive(Deserialize)]
struct StreamPart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

// ============================================================================
// History conversion
// ============================================================================

/// Build the `contents` array for one call: history, then the live message.
///
/// Consecutive entries with the same role (an unanswered user entry left by a
/// failed turn) are folded into one multi-part content so roles alternate.
pub fn build_contents(history: &[Message], message: &str) -> Vec<GeminiContent> {
    let mut contents: Vec<GeminiContent> = Vec::with_capacity(history.len() + 1);
    let live = Message::user(message);

    for entry in history.iter().chain(std::iter::once(&live)) {
        let part = GeminiPart {
            text: entry.content.clone(),
        };
        match contents.last_mut() {
            Some(previous) if previous.role == entry.role => previous.parts.push(part),
            _ => contents.push(GeminiContent {
                role: entry.role,
                parts: vec![part],
            }),
        }
    }

    contents
}

// ============================================================================
// Client
// ============================================================================

impl GeminiClient {
    pub fn new(api_key: ApiKey, settings: &Settings, persona: &Persona) -> Result<Self, AIError> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            system_instruction: persona.system_prompt.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn send_message(
        &self,
        history: &[Message],
        message: &str,
    ) -> Result<FragmentStream, AIError> {
        let request = GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: [TextPart {
                    text: &self.system_instruction,
                }],
            },
            contents: build_contents(history, message),
        };

        log::debug!(
            "Opening {} stream with {} history entries",
            self.model,
            history.len()
        );

        let builder = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&request);
        let mut events =
            EventSource::new(builder).map_err(|err| AIError::Other(err.to_string()))?;

        // The first event tells an open stream apart from a rejected request.
        let first = events.next().await;
        match first {
            Some(Ok(first)) => Ok(fragment_stream(
                stream::iter(std::iter::once(Ok(first))).chain(events),
            )),
            Some(Err(EventSourceError::InvalidStatusCode(status, response))) => {
                let body = response.text().await.unwrap_or_default();
                let message = error_message(&body);
                Err(if status == StatusCode::TOO_MANY_REQUESTS {
                    AIError::RateLimited { message }
                } else {
                    AIError::Api { status, message }
                })
            }
            Some(Err(EventSourceError::StreamEnded)) | None => Ok(stream::empty().boxed()),
            Some(Err(err)) => Err(AIError::EventSource(err)),
        }
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ => body.trim().to_string(),
    }
}

// ============================================================================
// Stream decoding
// ============================================================================

/// Text parts of one streamed chunk, in order. Thought summaries and empty
/// parts are skipped; an `error` object ends the turn.
pub fn parse_chunk(payload: &str) -> Result<Vec<String>, AIError> {
    let chunk: StreamChunk = serde_json::from_str(payload)?;

    if let Some(error) = chunk.error {
        return Err(AIError::Stream {
            code: error.code,
            status: error.status,
            message: error.message,
        });
    }

    Ok(chunk
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter(|part| !part.thought)
        .filter_map(|part| part.text)
        .filter(|text| !text.is_empty())
        .collect())
}

struct StreamState {
    events: BoxStream<'static, Result<Event, EventSourceError>>,
    ready: VecDeque<Result<String, AIError>>,
    finished: bool,
}

impl StreamState {
    fn queue(&mut self, payload: &str) {
        match parse_chunk(payload) {
            Ok(fragments) => self.ready.extend(fragments.into_iter().map(Ok)),
            Err(err) => {
                self.ready.push_back(Err(err));
                self.finished = true;
            }
        }
    }
}

/// Turn SSE events into a stream of text fragments.
///
/// The first error, or the server closing the stream, ends it. The event
/// source is dropped then, so it never reconnects.
pub fn fragment_stream<S>(events: S) -> FragmentStream
where
    S: Stream<Item = Result<Event, EventSourceError>> + Send + 'static,
{
    let state = StreamState {
        events: events.boxed(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.events.next().await {
                Some(Ok(Event::Open)) => {}
                Some(Ok(Event::Message(message))) => state.queue(&message.data),
                Some(Err(EventSourceError::StreamEnded)) | None => state.finished = true,
                Some(Err(err)) => {
                    state.ready.push_back(Err(AIError::EventSource(err)));
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}
