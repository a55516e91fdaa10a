//! LINE channel: webhook payload decoding, x-line-signature check, and reply via Messaging API.

use crate::channels::inbound::{InboundEvent, MessageKind, ReplyToken, SourceKind};
use crate::channels::sender::ReplySender;
use crate::reply::{OutboundReply, ReplyMessage};
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

const LINE_API_BASE: &str = "https://api.line.me";

/// Webhook POST body: a batch of events.
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl EventSource {
    fn kind_and_id(&self) -> (SourceKind, String) {
        let (kind, id) = match self.source_type.as_str() {
            "user" => (SourceKind::Individual, &self.user_id),
            "group" => (SourceKind::Group, &self.group_id),
            "room" => (SourceKind::Room, &self.room_id),
            _ => (SourceKind::Unsupported, &self.user_id),
        };
        (kind, id.clone().unwrap_or_default())
    }
}

impl WebhookBody {
    /// Message events with a reply token become `InboundEvent`s; everything else is dropped.
    pub fn into_inbound_events(self) -> Vec<InboundEvent> {
        self.events
            .into_iter()
            .filter_map(|event| {
                if event.event_type != "message" {
                    log::debug!("line: skipping {} event", event.event_type);
                    return None;
                }
                let Some(token) = event.reply_token else {
                    log::debug!("line: message event without reply token, skipping");
                    return None;
                };
                let (source_kind, source_id) = event
                    .source
                    .as_ref()
                    .map(EventSource::kind_and_id)
                    .unwrap_or((SourceKind::Unsupported, String::new()));
                let (message_kind, text) = match event.message {
                    Some(EventMessage {
                        message_type,
                        text: Some(text),
                    }) if message_type == "text" => (MessageKind::Text, text),
                    _ => (MessageKind::Other, String::new()),
                };
                Some(InboundEvent {
                    source_kind,
                    source_id,
                    message_kind,
                    text,
                    reply_token: ReplyToken::new(token),
                })
            })
            .collect()
    }
}

/// base64(HMAC-SHA256(channel_secret, body)), the value LINE puts in x-line-signature.
pub fn sign_body(channel_secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(channel_secret.as_bytes()).ok()?;
    mac.update(body);
    Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of x-line-signature against the raw request body.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = <Hmac<Sha256> as Mac>::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("line request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("line api error: {0}")]
    Api(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireMessage<'a> {
    Text {
        text: &'a str,
    },
    Image {
        #[serde(rename = "originalContentUrl")]
        original_content_url: &'a str,
        #[serde(rename = "previewImageUrl")]
        preview_image_url: &'a str,
    },
}

impl<'a> From<&'a ReplyMessage> for WireMessage<'a> {
    fn from(m: &'a ReplyMessage) -> Self {
        match m {
            ReplyMessage::Text { body } => WireMessage::Text { text: body },
            ReplyMessage::Image { url } => WireMessage::Image {
                original_content_url: url,
                preview_image_url: url,
            },
        }
    }
}

/// Messaging API client for replies.
pub struct LineChannel {
    api_base: String,
    access_token: String,
    client: reqwest::Client,
}

impl LineChannel {
    pub fn new(access_token: String, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| LINE_API_BASE.to_string());
        Self {
            api_base,
            access_token,
            client: reqwest::Client::new(),
        }
    }

    /// POST /v2/bot/message/reply.
    pub async fn reply(&self, token: ReplyToken, reply: &OutboundReply) -> Result<(), LineError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let body = ReplyRequest {
            reply_token: token.as_str(),
            messages: reply.messages().iter().map(WireMessage::from).collect(),
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LineError::Api(format!("reply failed: {} {}", status, body)));
        }
        Ok(())
    }
}

#[async_trait]
impl ReplySender for LineChannel {
    async fn send_reply(&self, token: ReplyToken, reply: &OutboundReply) -> Result<(), LineError> {
        self.reply(token, reply).await
    }
}
