//! Messaging channel (LINE): webhook decoding, signature check, and reply dispatch.
//!
//! Inbound webhook batches are converted to `InboundEvent`s for the router;
//! outbound replies go through the `ReplySender` trait.

mod inbound;
mod line;
mod sender;

pub use inbound::{InboundEvent, MessageKind, ReplyToken, SourceKind};
pub use line::{sign_body, verify_signature, LineChannel, LineError, WebhookBody};
pub use sender::ReplySender;
