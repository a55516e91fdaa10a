//! Reply dispatch seam: the router hands a finished reply and the event's token to a sender.

use async_trait::async_trait;

use crate::channels::inbound::ReplyToken;
use crate::channels::line::LineError;
use crate::reply::OutboundReply;

/// Sends one reply per token. Taking the token by value is what makes it single-use.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_reply(&self, token: ReplyToken, reply: &OutboundReply) -> Result<(), LineError>;
}
