//! Outbound reply payloads and the composer that builds them from photos or text.

use crate::photos::PhotoRecord;
use serde::Serialize;

/// Every valid photo path starts with this.
pub const PHOTO_PATH_PREFIX: &str = "/Photos/";

/// Exact tag that adds the recall notice below the photo.
pub const SPECIAL_TOPIC: &str = "罷免";

/// Max messages per reply call (platform limit).
pub const MAX_REPLY_MESSAGES: usize = 5;

const RECALL_NOTICE: &str = "罷免投票資訊整理好了：\n\
投票日期、地點請看中選會公告：\n\
https://www.cec.gov.tw/\n\
歷次投票結果查詢：\n\
https://db.cec.gov.tw/";

/// One message in a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReplyMessage {
    Image { url: String },
    Text { body: String },
}

/// Ordered 1..=5 messages sent once against a reply token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundReply {
    messages: Vec<ReplyMessage>,
}

impl OutboundReply {
    /// Single text message.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            messages: vec![ReplyMessage::Text { body: body.into() }],
        }
    }

    fn image(url: String) -> Self {
        Self {
            messages: vec![ReplyMessage::Image { url }],
        }
    }

    fn push(&mut self, message: ReplyMessage) {
        debug_assert!(self.messages.len() < MAX_REPLY_MESSAGES);
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ReplyMessage] {
        &self.messages
    }

    /// Text body of the first message, if it is text.
    pub fn first_text(&self) -> Option<&str> {
        match self.messages.first() {
            Some(ReplyMessage::Text { body }) => Some(body),
            _ => None,
        }
    }

    /// URL of the first message, if it is an image.
    pub fn first_image(&self) -> Option<&str> {
        match self.messages.first() {
            Some(ReplyMessage::Image { url }) => Some(url),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("photo path does not start with /Photos/: {0}")]
    InvalidPathShape(String),
}

/// Builds replies; owns the CDN base URL and the special-topic rule.
#[derive(Debug, Clone)]
pub struct ReplyComposer {
    cdn_base_url: String,
}

impl ReplyComposer {
    pub fn new(cdn_base_url: impl Into<String>) -> Self {
        let cdn_base_url = cdn_base_url.into().trim_end_matches('/').to_string();
        Self { cdn_base_url }
    }

    /// Image reply for a photo. When `topic` is exactly [`SPECIAL_TOPIC`], a second text
    /// message with the recall notice follows the image.
    pub fn image_reply_for(
        &self,
        photo: &PhotoRecord,
        topic: Option<&str>,
    ) -> Result<OutboundReply, ValidationError> {
        if !photo.path.starts_with(PHOTO_PATH_PREFIX) {
            return Err(ValidationError::InvalidPathShape(photo.path.clone()));
        }
        let url = force_https(&format!("{}{}", self.cdn_base_url, photo.path));
        let mut reply = OutboundReply::image(url);
        if topic == Some(SPECIAL_TOPIC) {
            reply.push(ReplyMessage::Text {
                body: RECALL_NOTICE.to_string(),
            });
        }
        Ok(reply)
    }

    pub fn text_reply_for(&self, body: impl Into<String>) -> OutboundReply {
        OutboundReply::text(body)
    }
}

/// LINE only accepts https image URLs.
fn force_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}
