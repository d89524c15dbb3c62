// conversation.rs

use std::time::Duration;

use futures::StreamExt;
use strum_macros::Display;

use crate::ai::ChatModel;
use crate::error::{AIError, SubmitError};
use crate::message::{Message, Role};
use crate::persona::Persona;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::transcript::Transcript;

/// Marker drawn after a reply that is still streaming.
pub const CURSOR: char = '▌';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TurnState {
    Idle,
    AwaitingResponse,
    Streaming,
}

/// What one call to the model needs: the history and the live message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub history: Vec<Message>,
    pub message: String,
}

impl TurnRequest {
    /// Split a transcript ending in a user entry into history + live message.
    pub fn from_transcript(messages: &[Message]) -> Option<Self> {
        let (last, history) = messages.split_last()?;
        (last.role == Role::User).then(|| TurnRequest {
            history: history.to_vec(),
            message: last.content.clone(),
        })
    }
}

/// Progress reported while a reply is being produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    Fragment(String),
    Retrying { attempt: u32, delay: Duration },
}

/// One session: the transcript plus the state of the turn in flight.
///
/// A failed turn keeps its user entry. The next request folds it together
/// with the new message, so the model still sees it.
#[derive(Debug)]
pub struct Conversation {
    transcript: Transcript,
    state: TurnState,
    buffer: String,
    fragments: usize,
}

impl Conversation {
    pub fn new(persona: &Persona) -> Self {
        Conversation {
            transcript: Transcript::new(persona.greeting),
            state: TurnState::Idle,
            buffer: String::new(),
            fragments: 0,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state != TurnState::Idle
    }

    /// Start a turn. Surrounding whitespace is dropped before anything is recorded.
    pub fn submit(&mut self, input: &str) -> Result<TurnRequest, SubmitError> {
        if self.is_busy() {
            return Err(SubmitError::TurnInProgress);
        }
        let text = input.trim();
        if text.is_empty() {
            return Err(SubmitError::Empty);
        }

        self.transcript.append(Message::user(text));
        self.state = TurnState::AwaitingResponse;
        self.buffer.clear();
        self.fragments = 0;
        log::info!(
            "Turn started with {} transcript entries",
            self.transcript.len()
        );

        TurnRequest::from_transcript(self.transcript.all()).ok_or(SubmitError::Empty)
    }

    /// Add a fragment and return what should be on screen now.
    pub fn push_fragment(&mut self, fragment: &str) -> String {
        self.buffer.push_str(fragment);
        self.fragments += 1;
        self.state = TurnState::Streaming;
        self.streaming_text()
    }

    /// A retry replays the whole call, so the partial reply is thrown away.
    pub fn restart_stream(&mut self) {
        self.buffer.clear();
        self.fragments = 0;
        if self.is_busy() {
            self.state = TurnState::AwaitingResponse;
        }
    }

    /// The reply in progress with its cursor, if a turn is in flight.
    pub fn render(&self) -> Option<String> {
        self.is_busy().then(|| self.streaming_text())
    }

    fn streaming_text(&self) -> String {
        format!("{}{}", self.buffer, CURSOR)
    }

    /// Commit the streamed reply. An empty stream commits an empty reply.
    pub fn complete(&mut self) -> &Message {
        let reply = std::mem::take(&mut self.buffer);
        log::info!(
            "Turn completed: {} fragments, {} bytes",
            self.fragments,
            reply.len()
        );
        self.transcript.append(Message::assistant(reply));
        self.state = TurnState::Idle;
        self.fragments = 0;
        &self.transcript.all()[self.transcript.len() - 1]
    }

    /// Abandon the turn and return the message to show the player.
    pub fn fail(&mut self, error: &AIError) -> String {
        log::error!("Turn failed in state {}: {}", self.state, error);
        self.buffer.clear();
        self.fragments = 0;
        self.state = TurnState::Idle;
        format!("Connection Error: {error}")
    }

    /// Back to the greeting. Refused while a turn is in flight.
    pub fn reset(&mut self) -> Result<(), SubmitError> {
        if self.is_busy() {
            return Err(SubmitError::TurnInProgress);
        }
        self.transcript.reset();
        log::info!("Transcript reset");
        Ok(())
    }
}

/// Produce one reply, retrying rate limits by replaying the whole call.
///
/// Every non-empty fragment is reported through `on_event` as it arrives; a
/// retry is reported before its pause so the caller can drop partial text.
pub async fn stream_reply<F>(
    model: &dyn ChatModel,
    request: &TurnRequest,
    policy: &RetryPolicy,
    on_event: &F,
) -> Result<String, AIError>
where
    F: Fn(TurnEvent) + Sync,
{
    retry_with_backoff(
        policy,
        move |_attempt| async move {
            let mut stream = model
                .send_message(&request.history, &request.message)
                .await?;
            let mut reply = String::new();
            while let Some(fragment) = stream.next().await {
                let fragment = fragment?;
                if fragment.is_empty() {
                    continue;
                }
                reply.push_str(&fragment);
                on_event(TurnEvent::Fragment(fragment));
            }
            Ok::<_, AIError>(reply)
        },
        |attempt, delay| on_event(TurnEvent::Retrying { attempt, delay }),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Conversation {
        Conversation::new(&Persona::sentinel_x())
    }

    #[test]
    fn submit_appends_the_trimmed_entry() {
        let mut conversation = conversation();
        let request = conversation
            .submit("  What does the room look like?\n")
            .expect("turn");
        assert_eq!(request.message, "What does the room look like?");
        assert_eq!(request.history, [Message::assistant(crate::persona::GREETING)]);
        assert_eq!(conversation.transcript().len(), 2);
        assert_eq!(conversation.state(), TurnState::AwaitingResponse);
    }

    #[test]
    fn blank_submissions_start_nothing() {
        let mut conversation = conversation();
        for input in ["", "   ", "\n\t"] {
            assert_eq!(conversation.submit(input), Err(SubmitError::Empty));
        }
        assert_eq!(conversation.transcript().len(), 1);
        assert_eq!(conversation.state(), TurnState::Idle);
    }

    #[test]
    fn one_turn_at_a_time() {
        let mut conversation = conversation();
        conversation.submit("first").expect("turn");
        assert_eq!(
            conversation.submit("second"),
            Err(SubmitError::TurnInProgress)
        );
        assert_eq!(conversation.reset(), Err(SubmitError::TurnInProgress));
        assert_eq!(conversation.transcript().len(), 2);
    }

    #[test]
    fn intermediate_renders_are_prefixes_of_the_reply() {
        let mut conversation = conversation();
        conversation.submit("hello").expect("turn");
        let fragments = ["A metal ", "box that ", "spins."];
        let renders: Vec<String> = fragments
            .iter()
            .map(|f| conversation.push_fragment(f))
            .collect();
        assert_eq!(conversation.state(), TurnState::Streaming);

        let reply = conversation.complete().content.clone();
        assert_eq!(reply, fragments.concat());
        for render in renders {
            let shown = render.strip_suffix(CURSOR).expect("cursor");
            assert!(reply.starts_with(shown));
        }
        assert_eq!(conversation.render(), None);
    }

    #[test]
    fn restart_discards_partial_text() {
        let mut conversation = conversation();
        conversation.submit("hello").expect("turn");
        conversation.push_fragment("stale");
        conversation.restart_stream();
        assert_eq!(conversation.state(), TurnState::AwaitingResponse);
        assert_eq!(conversation.render().as_deref(), Some("▌"));
        conversation.push_fragment("fresh");
        assert_eq!(conversation.complete().content, "fresh");
    }

    #[test]
    fn failure_keeps_the_user_entry_only() {
        let mut conversation = conversation();
        conversation.submit("Where is it?").expect("turn");
        conversation.push_fragment("half");
        let shown = conversation.fail(&AIError::Other("socket closed".into()));
        assert_eq!(shown, "Connection Error: socket closed");
        assert_eq!(conversation.transcript().len(), 2);
        assert_eq!(
            conversation.transcript().last(),
            Some(&Message::user("Where is it?"))
        );
        assert!(!conversation.is_busy());
    }

    #[test]
    fn empty_stream_commits_an_empty_reply() {
        let mut conversation = conversation();
        conversation.submit("hello").expect("turn");
        assert_eq!(conversation.complete(), &Message::assistant(""));
        assert_eq!(conversation.transcript().len(), 3);
    }

    #[test]
    fn request_needs_a_trailing_user_entry() {
        assert_eq!(TurnRequest::from_transcript(&[]), None);
        assert_eq!(
            TurnRequest::from_transcript(&[Message::assistant("hi")]),
            None
        );
    }
}
