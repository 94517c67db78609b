//! Property-based tests for the conversation state machine.

use super::*;
use crate::protocol::ReplyBody;
use proptest::prelude::*;
use std::cell::{Cell, RefCell};

/// Records sends and optionally refuses them, like a dropped connection.
struct RecordingSink {
    connected: bool,
    sent: RefCell<Vec<String>>,
    attempts: Cell<usize>,
}

impl RecordingSink {
    fn new(connected: bool) -> Self {
        Self {
            connected,
            sent: RefCell::new(Vec::new()),
            attempts: Cell::new(0),
        }
    }
}

impl MessageSink for RecordingSink {
    fn send_chat_message(
        &self,
        _bot_id: &str,
        message: &str,
        _conversation_id: &ConversationId,
    ) -> Result<(), SessionError> {
        self.attempts.set(self.attempts.get() + 1);
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        self.sent.borrow_mut().push(message.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Op {
    Submit(String),
    Typing,
    Reply(Option<String>),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => "[ a-z?]{0,12}".prop_map(Op::Submit),
        1 => Just(Op::Typing),
        2 => proptest::option::of("[a-zA-Z!]{1,10}").prop_map(Op::Reply),
    ]
}

fn reply_from(text: Option<String>) -> BotReply {
    BotReply {
        body: text.map(ReplyBody::Message).unwrap_or(ReplyBody::Empty),
        educational_image: None,
    }
}

fn test_bot() -> BotRef {
    BotRef::new("bot-1", "Prop Bot", "Logic", "5")
}

proptest! {
    #[test]
    fn prop_sends_only_from_idle(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let sink = RecordingSink::new(true);
        let mut conversation = Conversation::new(test_bot());
        let mut expected_sends = 0usize;

        for op in ops {
            let was_idle = conversation.phase() == Phase::Idle;
            let before = conversation.transcript().len();
            match op {
                Op::Submit(text) => {
                    let outcome = conversation.submit_user_turn(&text, &sink).unwrap();
                    let blank = text.trim().is_empty();
                    if blank {
                        prop_assert_eq!(outcome, SubmitOutcome::EmptyInput);
                        prop_assert_eq!(conversation.transcript().len(), before);
                    } else if !was_idle {
                        prop_assert_eq!(outcome, SubmitOutcome::Busy);
                        prop_assert_eq!(conversation.transcript().len(), before);
                    } else {
                        expected_sends += 1;
                        prop_assert_eq!(outcome, SubmitOutcome::Sent);
                        prop_assert!(conversation.is_composing());
                    }
                }
                Op::Typing => {
                    conversation.on_typing();
                    prop_assert!(conversation.is_composing());
                    prop_assert_eq!(conversation.transcript().len(), before);
                }
                Op::Reply(text) => {
                    conversation.on_reply(reply_from(text));
                    prop_assert!(!conversation.is_composing());
                    prop_assert_eq!(conversation.transcript().len(), before + 1);
                }
            }
        }

        prop_assert_eq!(sink.sent.borrow().len(), expected_sends);
        prop_assert_eq!(sink.attempts.get(), expected_sends);
    }

    #[test]
    fn prop_transcript_is_append_only(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let sink = RecordingSink::new(true);
        let mut conversation = Conversation::new(test_bot());
        let mut snapshot = conversation.transcript().to_vec();

        for op in ops {
            match op {
                Op::Submit(text) => {
                    let _ = conversation.submit_user_turn(&text, &sink);
                }
                Op::Typing => conversation.on_typing(),
                Op::Reply(text) => {
                    conversation.on_reply(reply_from(text));
                }
            }
            let current = conversation.transcript();
            prop_assert!(current.len() >= snapshot.len());
            prop_assert_eq!(&current[..snapshot.len()], &snapshot[..]);
            prop_assert!(current.iter().all(|turn| !turn.text().is_empty()));
            snapshot = current.to_vec();
        }
    }

    #[test]
    fn prop_disconnected_sink_never_composes(texts in proptest::collection::vec("[a-z]{1,8}", 1..10)) {
        let sink = RecordingSink::new(false);
        let mut conversation = Conversation::new(test_bot());

        for text in &texts {
            let result = conversation.submit_user_turn(text, &sink);
            prop_assert!(matches!(result, Err(SessionError::NotConnected)));
            prop_assert!(!conversation.is_composing());
        }

        // Every failed turn stays in the transcript after the greeting.
        prop_assert_eq!(conversation.transcript().len(), texts.len() + 1);
        prop_assert_eq!(sink.attempts.get(), texts.len());
    }
}
