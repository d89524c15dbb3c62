pub mod ai;
pub mod app;
pub mod conversation;
pub mod error;
pub mod logging;
pub mod message;
pub mod persona;
pub mod retry;
pub mod secrets;
pub mod settings;
pub mod transcript;
pub mod tui;
pub mod ui;

// Re-export commonly used items for easier access
pub use ai::{ChatModel, FragmentStream, GeminiClient};
pub use conversation::{Conversation, TurnEvent, TurnRequest, TurnState, stream_reply};
pub use error::{AIError, AppError, ConfigError, SubmitError};
pub use message::{Message, Role};
pub use persona::Persona;
pub use retry::RetryPolicy;
pub use settings::Settings;
pub use transcript::Transcript;
