//! Inbound event from the messaging platform: already verified and decoded, handed to the router once.

use std::fmt;

/// Where the message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// One-on-one chat.
    Individual,
    Group,
    Room,
    /// Any source type the bot does not handle.
    Unsupported,
}

/// Only text messages are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Other,
}

/// Single-use handle for answering one event. Not `Clone`: sending a reply consumes it.
#[derive(PartialEq, Eq)]
pub struct ReplyToken(String);

impl ReplyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ReplyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReplyToken(..)")
    }
}

/// One message event from a webhook delivery.
#[derive(Debug)]
pub struct InboundEvent {
    pub source_kind: SourceKind,
    pub source_id: String,
    pub message_kind: MessageKind,
    pub text: String,
    pub reply_token: ReplyToken,
}

impl InboundEvent {
    /// Text event, mostly for tests and the CLI.
    pub fn text(source_kind: SourceKind, source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_kind,
            source_id: source_id.into(),
            message_kind: MessageKind::Text,
            text: text.into(),
            reply_token: ReplyToken::new(""),
        }
    }
}
