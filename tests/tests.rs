// ../tests/tests.rs
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use sentinel_ratatui::persona::{GREETING, REFUSAL, VICTORY};
use sentinel_ratatui::*;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Plays Sentinel-X by the rules so whole sessions can be scripted.
#[derive(Default)]
struct RuleFollower {
    calls: Mutex<Vec<(Vec<Message>, String)>>,
}

#[async_trait]
impl ChatModel for RuleFollower {
    async fn send_message(
        &self,
        history: &[Message],
        message: &str,
    ) -> Result<FragmentStream, AIError> {
        self.calls
            .lock()
            .unwrap()
            .push((history.to_vec(), message.to_string()));

        let lower = message.to_lowercase();
        let reply = if lower.contains("old canteen") && lower.contains("red microwave") {
            VICTORY.to_string()
        } else if lower.starts_with("where") || lower.starts_with("who") {
            REFUSAL.to_string()
        } else {
            "A place where organic fuel is consumed, now silent. \
             A metal box that spins and heats, but now holds cold silence."
                .to_string()
        };

        let fragments: Vec<Result<String, AIError>> = reply
            .split_inclusive(' ')
            .map(|word| Ok(word.to_string()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }
}

/// Replays canned outcomes, one per call.
struct Scripted {
    outcomes: Mutex<VecDeque<Result<Vec<&'static str>, AIError>>>,
    calls: Mutex<u32>,
}

impl Scripted {
    fn new(outcomes: Vec<Result<Vec<&'static str>, AIError>>) -> Self {
        Scripted {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ChatModel for Scripted {
    async fn send_message(
        &self,
        _history: &[Message],
        _message: &str,
    ) -> Result<FragmentStream, AIError> {
        *self.calls.lock().unwrap() += 1;
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AIError::Other("script exhausted".into())));
        let fragments = outcome?;
        Ok(stream::iter(fragments.into_iter().map(|f| Ok(f.to_string()))).boxed())
    }
}

/// Streams that open fine but may break part way through, one per call.
struct Interrupted {
    streams: Mutex<VecDeque<Vec<Result<&'static str, AIError>>>>,
}

impl Interrupted {
    fn new(streams: Vec<Vec<Result<&'static str, AIError>>>) -> Self {
        Interrupted {
            streams: Mutex::new(streams.into()),
        }
    }
}

#[async_trait]
impl ChatModel for Interrupted {
    async fn send_message(
        &self,
        _history: &[Message],
        _message: &str,
    ) -> Result<FragmentStream, AIError> {
        let items = self.streams.lock().unwrap().pop_front().unwrap_or_default();
        Ok(stream::iter(items.into_iter().map(|item| item.map(str::to_string))).boxed())
    }
}

fn rate_limited() -> AIError {
    AIError::RateLimited {
        message: "Resource has been exhausted".into(),
    }
}

/// Drive one turn the way the app does and return what was shown on the way.
async fn play_turn(
    conversation: &mut Conversation,
    model: &dyn ChatModel,
    policy: &RetryPolicy,
    input: &str,
) -> (Result<String, AIError>, Vec<TurnEvent>) {
    let request = conversation.submit(input).expect("turn starts");
    let events = Mutex::new(Vec::new());
    let result = stream_reply(model, &request, policy, &|event: TurnEvent| {
        events.lock().unwrap().push(event)
    })
    .await;

    let events = events.into_inner().unwrap();
    for event in &events {
        match event {
            TurnEvent::Fragment(fragment) => {
                conversation.push_fragment(fragment);
            }
            TurnEvent::Retrying { .. } => conversation.restart_stream(),
        }
    }
    match &result {
        Ok(_) => {
            conversation.complete();
        }
        Err(err) => {
            conversation.fail(err);
        }
    }
    (result, events)
}

#[tokio::test]
async fn transcript_grows_by_two_per_successful_turn() {
    let persona = Persona::sentinel_x();
    let model = RuleFollower::default();
    let policy = RetryPolicy::default();
    let mut conversation = Conversation::new(&persona);

    let questions = [
        "Describe the surroundings",
        "What do you see near the item?",
        "Any smells?",
    ];
    for (n, question) in questions.iter().enumerate() {
        let (result, _) = play_turn(&mut conversation, &model, &policy, question).await;
        result.expect("reply");
        assert_eq!(conversation.transcript().len(), 1 + 2 * (n + 1));
    }

    let roles: Vec<Role> = conversation
        .transcript()
        .all()
        .iter()
        .map(|m| m.role)
        .collect();
    assert_eq!(roles[0], Role::Assistant);
    for pair in roles[1..].chunks(2) {
        assert_eq!(pair, [Role::User, Role::Assistant]);
    }

    // Each call saw the full transcript before the live message.
    let calls = model.calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].0, [Message::assistant(GREETING)]);
    assert_eq!(calls[2].0.len(), 5);
    assert_eq!(calls[2].1, "Any smells?");
}

#[tokio::test]
async fn direct_questions_are_refused() {
    let persona = Persona::sentinel_x();
    let model = RuleFollower::default();
    let mut conversation = Conversation::new(&persona);

    let (result, _) = play_turn(
        &mut conversation,
        &model,
        &RetryPolicy::default(),
        "Where is it?",
    )
    .await;

    let reply = result.expect("reply");
    assert!(reply.contains(REFUSAL));
    assert!(persona.is_refusal(&conversation.transcript().last().unwrap().content));
}

#[tokio::test]
async fn descriptive_questions_never_name_the_answer() {
    let persona = Persona::sentinel_x();
    let model = RuleFollower::default();
    let mut conversation = Conversation::new(&persona);

    let (result, _) = play_turn(
        &mut conversation,
        &model,
        &RetryPolicy::default(),
        "What does the place look like?",
    )
    .await;

    let reply = result.expect("reply");
    assert!(!reply.contains("Old Canteen"));
    assert!(!reply.contains("Red Microwave"));
    assert!(!persona.is_victory(&reply));
}

#[tokio::test]
async fn naming_room_and_hiding_place_wins() {
    let persona = Persona::sentinel_x();
    let model = RuleFollower::default();
    let mut conversation = Conversation::new(&persona);

    let (result, _) = play_turn(
        &mut conversation,
        &model,
        &RetryPolicy::default(),
        "It is in the Old Canteen, inside the Red Microwave",
    )
    .await;

    assert_eq!(result.expect("reply"), VICTORY);
    assert!(persona.is_victory(&conversation.transcript().last().unwrap().content));
}

#[tokio::test]
async fn reset_returns_to_the_greeting() {
    let persona = Persona::sentinel_x();
    let model = RuleFollower::default();
    let mut conversation = Conversation::new(&persona);
    play_turn(&mut conversation, &model, &RetryPolicy::default(), "Hello")
        .await
        .0
        .expect("reply");
    assert_eq!(conversation.transcript().len(), 3);

    conversation.reset().expect("reset");
    assert_eq!(
        conversation.transcript().all(),
        [Message::assistant(GREETING)]
    );
}

#[tokio::test]
async fn failed_turn_keeps_only_the_user_entry() {
    let persona = Persona::sentinel_x();
    let model = Scripted::new(vec![
        Err(AIError::Other("connection reset".into())),
        Ok(vec!["Static. ", "Then silence."]),
    ]);
    let policy = RetryPolicy::default();
    let mut conversation = Conversation::new(&persona);

    let (result, _) = play_turn(&mut conversation, &model, &policy, "First try").await;
    assert!(result.is_err());
    assert_eq!(model.calls(), 1);
    assert_eq!(conversation.transcript().len(), 2);
    assert!(!conversation.is_busy());

    // The session carries on after a failure.
    let (result, _) = play_turn(&mut conversation, &model, &policy, "Second try").await;
    assert_eq!(result.expect("reply"), "Static. Then silence.");
    assert_eq!(conversation.transcript().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn rate_limits_are_retried_with_backoff() {
    let persona = Persona::sentinel_x();
    let model = Scripted::new(vec![
        Err(rate_limited()),
        Err(rate_limited()),
        Ok(vec!["Cold ", "silence."]),
    ]);
    let mut conversation = Conversation::new(&persona);
    let start = tokio::time::Instant::now();

    let (result, events) =
        play_turn(&mut conversation, &model, &RetryPolicy::default(), "Clues?").await;

    assert_eq!(result.expect("reply"), "Cold silence.");
    assert_eq!(model.calls(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    assert_eq!(
        events[..2],
        [
            TurnEvent::Retrying {
                attempt: 1,
                delay: Duration::from_secs(1)
            },
            TurnEvent::Retrying {
                attempt: 2,
                delay: Duration::from_secs(2)
            },
        ]
    );
    assert_eq!(
        conversation.transcript().last(),
        Some(&Message::assistant("Cold silence."))
    );
}

#[tokio::test(start_paused = true)]
async fn rate_limit_on_every_attempt_fails_the_turn() {
    let persona = Persona::sentinel_x();
    let model = Scripted::new(vec![
        Err(rate_limited()),
        Err(rate_limited()),
        Err(rate_limited()),
        Ok(vec!["never reached"]),
    ]);
    let mut conversation = Conversation::new(&persona);

    let (result, _) =
        play_turn(&mut conversation, &model, &RetryPolicy::default(), "Clues?").await;

    assert!(result.unwrap_err().is_rate_limit());
    assert_eq!(model.calls(), 3);
    assert_eq!(conversation.transcript().len(), 2);
}

#[tokio::test]
async fn other_errors_are_not_retried() {
    let persona = Persona::sentinel_x();
    let model = Scripted::new(vec![
        Err(AIError::Other("bad request".into())),
        Ok(vec!["never reached"]),
    ]);
    let mut conversation = Conversation::new(&persona);

    let (result, events) =
        play_turn(&mut conversation, &model, &RetryPolicy::default(), "Clues?").await;

    assert!(result.is_err());
    assert!(events.is_empty());
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn every_render_is_a_prefix_of_the_final_reply() {
    let persona = Persona::sentinel_x();
    let fragments = vec!["A unit ", "carrying a ", "soldering iron", "."];
    let model = Scripted::new(vec![Ok(fragments.clone())]);
    let mut conversation = Conversation::new(&persona);

    let request = conversation.submit("Who was here?").expect("turn");
    let mut stream = model
        .send_message(&request.history, &request.message)
        .await
        .expect("stream");
    let mut renders = Vec::new();
    while let Some(fragment) = stream.next().await {
        renders.push(conversation.push_fragment(&fragment.expect("fragment")));
    }
    let reply = conversation.complete().content.clone();

    assert_eq!(reply, fragments.concat());
    for render in renders {
        let shown = render.trim_end_matches(conversation::CURSOR);
        assert!(reply.starts_with(shown));
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limit_mid_stream_restarts_the_reply() {
    let persona = Persona::sentinel_x();
    let model = Interrupted::new(vec![
        vec![
            Ok("stale "),
            Err(AIError::Stream {
                code: 429,
                status: "RESOURCE_EXHAUSTED".into(),
                message: "Resource has been exhausted".into(),
            }),
        ],
        vec![Ok("fresh")],
    ]);
    let mut conversation = Conversation::new(&persona);

    let (result, events) =
        play_turn(&mut conversation, &model, &RetryPolicy::default(), "Clues?").await;

    assert_eq!(result.expect("reply"), "fresh");
    assert_eq!(
        events,
        [
            TurnEvent::Fragment("stale ".into()),
            TurnEvent::Retrying {
                attempt: 1,
                delay: Duration::from_secs(1)
            },
            TurnEvent::Fragment("fresh".into()),
        ]
    );
    assert_eq!(conversation.transcript().len(), 3);
    assert_eq!(
        conversation.transcript().last(),
        Some(&Message::assistant("fresh"))
    );
}
