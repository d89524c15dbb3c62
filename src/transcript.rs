// transcript.rs

use crate::message::Message;

/// Append-only conversation history for one session.
///
/// Always holds at least the greeting. Entries are only dropped by [`Transcript::reset`].
#[derive(Debug, Clone)]
pub struct Transcript {
    greeting: String,
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        Transcript {
            messages: vec![Message::assistant(greeting.clone())],
            greeting,
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.messages.push(Message::assistant(self.greeting.clone()));
    }
}
