// /app.rs
use crate::{
    ai::ChatModel,
    conversation::{Conversation, TurnEvent, TurnRequest, stream_reply},
    error::{AIError, SubmitError},
    persona::Persona,
    retry::RetryPolicy,
    settings::Settings,
    tui::{Tui, TuiEvent},
    ui::{self, spinner::Spinner},
};

use color_eyre::eyre::Result;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tui_textarea::TextArea;

pub enum Action {
    Quit,
    Submit,
    Reset,
    Scroll(ScrollRequest),
    Turn(TurnEvent),
    TurnFinished(std::result::Result<String, AIError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollRequest {
    Up(usize),
    Down(usize),
    Top,
    Bottom,
}

/// Scroll position of the transcript pane. `follow` pins it to the newest line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scroll {
    pub offset: usize,
    pub follow: bool,
}

impl Default for Scroll {
    fn default() -> Self {
        Scroll {
            offset: 0,
            follow: true,
        }
    }
}

impl Scroll {
    pub fn apply(&mut self, request: ScrollRequest) {
        match request {
            ScrollRequest::Up(lines) => {
                self.offset = self.offset.saturating_sub(lines);
                self.follow = false;
            }
            ScrollRequest::Down(lines) => self.offset = self.offset.saturating_add(lines),
            ScrollRequest::Top => {
                self.offset = 0;
                self.follow = false;
            }
            ScrollRequest::Bottom => self.follow = true,
        }
    }

    /// Clamp to the content and return the first visible line.
    pub fn resolve(&mut self, total_lines: usize, visible_lines: usize) -> usize {
        let max_offset = total_lines.saturating_sub(visible_lines);
        if self.follow || self.offset >= max_offset {
            self.offset = max_offset;
            self.follow = true;
        }
        self.offset
    }
}

pub struct App {
    // Application state and control flow
    running: bool,

    // --- Global information
    pub(crate) persona: Persona,
    model: Arc<dyn ChatModel>,
    policy: RetryPolicy,
    pub(crate) settings: Settings,

    // --- Session
    pub(crate) conversation: Conversation,
    turn_task: Option<JoinHandle<()>>,

    // --- UI elements
    pub(crate) input: TextArea<'static>,
    pub(crate) spinner: Spinner,
    pub(crate) scroll: Scroll,
    pub(crate) status: Option<String>,

    action_sender: mpsc::UnboundedSender<Action>,
    action_receiver: mpsc::UnboundedReceiver<Action>,
}

impl App {
    pub fn new(model: Arc<dyn ChatModel>, persona: Persona, settings: Settings) -> Self {
        let (action_sender, action_receiver) = mpsc::unbounded_channel();

        Self {
            running: true,

            conversation: Conversation::new(&persona),
            turn_task: None,
            persona,
            model,
            policy: settings.retry_policy(),
            settings,

            input: ui::chat::new_input(),
            spinner: Spinner::new(),
            scroll: Scroll::default(),
            status: None,

            action_sender,
            action_receiver,
        }
    }

    // Asynchronous function to continuously run and update the application.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?
            .tick_rate(10.0) // spinner speed
            .frame_rate(30.0);

        tui.enter()?; // Starts event handler, enters raw mode, enters alternate screen

        while self.running {
            tui.draw(|frame| ui::draw(frame, self))?;

            tokio::select! {
                Some(event) = tui.next() => self.handle_tui_event(event),
                Some(action) = self.action_receiver.recv() => self.handle_action(action),
                else => break,
            }
        }

        if let Some(task) = self.turn_task.take() {
            task.abort();
        }
        tui.exit()?; // stops event handler, exits raw mode, exits alternate screen
        Ok(())
    }

    fn handle_tui_event(&mut self, event: TuiEvent) {
        match event {
            TuiEvent::Key(key_event) => {
                if let Some(action) = self.on_key(key_event) {
                    self.handle_action(action);
                }
            }
            TuiEvent::Paste(text) => {
                if !self.conversation.is_busy() {
                    self.input.insert_str(text);
                }
            }
            TuiEvent::Tick => self.spinner.tick(),
            TuiEvent::Error => log::warn!("Failed to read a terminal event"),
            TuiEvent::Init | TuiEvent::Render | TuiEvent::Resize(_, _) => {}
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => Some(Action::Quit),
            KeyCode::Char('c') if ctrl => Some(Action::Quit),
            KeyCode::Char('r') if ctrl => Some(Action::Reset),
            KeyCode::Enter if key.modifiers.is_empty() => Some(Action::Submit),
            KeyCode::PageUp => Some(Action::Scroll(ScrollRequest::Up(10))),
            KeyCode::PageDown => Some(Action::Scroll(ScrollRequest::Down(10))),
            KeyCode::Up if ctrl => Some(Action::Scroll(ScrollRequest::Up(1))),
            KeyCode::Down if ctrl => Some(Action::Scroll(ScrollRequest::Down(1))),
            KeyCode::Home if ctrl => Some(Action::Scroll(ScrollRequest::Top)),
            KeyCode::End if ctrl => Some(Action::Scroll(ScrollRequest::Bottom)),
            _ => {
                // The input is frozen while Sentinel-X answers.
                if !self.conversation.is_busy() {
                    self.input.input(key);
                }
                None
            }
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.quit(),
            Action::Submit => self.submit(),
            Action::Reset => self.reset(),
            Action::Scroll(request) => self.scroll.apply(request),
            Action::Turn(TurnEvent::Fragment(fragment)) => {
                self.spinner.stop();
                self.conversation.push_fragment(&fragment);
                self.scroll.apply(ScrollRequest::Bottom);
            }
            Action::Turn(TurnEvent::Retrying { attempt, delay }) => {
                self.conversation.restart_stream();
                self.spinner.start();
                self.status = Some(format!(
                    "Rate limited. Retry {}/{} in {}s…",
                    attempt,
                    self.policy.max_attempts.saturating_sub(1),
                    delay.as_secs_f32()
                ));
            }
            Action::TurnFinished(result) => self.finish_turn(result),
        }
    }

    fn submit(&mut self) {
        let text = self.input.lines().join("\n");
        match self.conversation.submit(&text) {
            Ok(request) => {
                self.input = ui::chat::new_input();
                self.status = None;
                self.scroll.apply(ScrollRequest::Bottom);
                self.spawn_turn(request);
            }
            Err(SubmitError::Empty) => {}
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    fn spawn_turn(&mut self, request: TurnRequest) {
        let model = Arc::clone(&self.model);
        let policy = self.policy.clone();
        let sender = self.action_sender.clone();
        self.spinner.start();

        self.turn_task = Some(tokio::spawn(async move {
            let forward = |event: TurnEvent| {
                let _ = sender.send(Action::Turn(event));
            };
            let result = stream_reply(&*model, &request, &policy, &forward).await;
            let _ = sender.send(Action::TurnFinished(result));
        }));
    }

    fn finish_turn(&mut self, result: std::result::Result<String, AIError>) {
        self.spinner.stop();
        self.turn_task = None;
        match result {
            Ok(_) => {
                let reply = self.conversation.complete();
                self.status = if self.persona.is_victory(&reply.content) {
                    log::info!("Player solved the mystery");
                    Some("Mission complete. Press Ctrl+R to play again.".to_string())
                } else {
                    None
                };
            }
            Err(err) => self.status = Some(self.conversation.fail(&err)),
        }
        self.scroll.apply(ScrollRequest::Bottom);
    }

    fn reset(&mut self) {
        match self.conversation.reset() {
            Ok(()) => {
                self.status = None;
                self.scroll = Scroll::default();
                self.input = ui::chat::new_input();
            }
            Err(err) => self.status = Some(format!("{err}. Reset once the reply is in.")),
        }
    }

    fn quit(&mut self) {
        self.running = false;
    }
}
