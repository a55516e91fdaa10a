//! Event router: classify one inbound event and run its fallback chain until a strategy replies.
//!
//! Each command maps to an ordered list of [`Strategy`] values. Strategies run one at a time;
//! the first that breaks with a reply ends the chain. Every chain for a replied-to command ends
//! in a strategy that always replies, so an event gets exactly one reply or an explicit,
//! logged suppression.

use std::ops::ControlFlow;
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::channels::{InboundEvent, LineError, MessageKind, ReplySender, SourceKind};
use crate::config::Settings;
use crate::llm::{GeminiClient, TextGenerator};
use crate::persona::{ExpandMode, KeywordExpander, StyleResponder};
use crate::photos::{HttpPhotoCatalog, PhotoCatalog, PhotoRecord};
use crate::quotes::QuoteBank;
use crate::reply::{OutboundReply, ReplyComposer};

pub const GREETING_COMMANDS: [&str; 2] = ["院長好", "院長早安"];
pub const QUOTE_COMMANDS: [&str; 2] = ["院長，金句", "院長，語錄"];
pub const TAG_LEAD_INS: [&str; 2] = ["院長，", "院長 "];

pub const NO_PHOTO_TEXT: &str = "院長現在找不到照片，晚點再來打招呼吧！";
pub const INVALID_PHOTO_TEXT: &str = "照片資料有點問題，院長正在處理，請稍後再試。";

pub fn tag_fallback_text(tag: &str) -> String {
    format!("院長翻遍相簿也找不到「{}」，這題先跳過！", tag)
}

pub fn free_text_fallback_text(message: &str) -> String {
    format!("院長聽不太懂「{}」，換個說法再說一次？", message)
}

/// What the trimmed message text asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Greeting,
    Quote,
    Tag(&'a str),
    FreeText(&'a str),
}

/// Classify in priority order: greeting, quote, tag lead-in, then free text.
/// A lead-in with nothing after it is free text.
pub fn classify(text: &str) -> Command<'_> {
    let text = text.trim();
    if GREETING_COMMANDS.contains(&text) {
        return Command::Greeting;
    }
    if QUOTE_COMMANDS.contains(&text) {
        return Command::Quote;
    }
    TAG_LEAD_INS
        .iter()
        .find_map(|lead| text.strip_prefix(lead))
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(Command::Tag)
        .unwrap_or(Command::FreeText(text))
}

/// How a direct search treats its failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPolicy {
    /// Reply with the categorized fetch error instead of falling through.
    pub surface_fetch_error: bool,
    /// Reply with [`INVALID_PHOTO_TEXT`] instead of falling through.
    pub surface_invalid_path: bool,
}

impl SearchPolicy {
    const GREETING: SearchPolicy = SearchPolicy {
        surface_fetch_error: false,
        surface_invalid_path: true,
    };
    const TAG: SearchPolicy = SearchPolicy {
        surface_fetch_error: true,
        surface_invalid_path: true,
    };
    const GUESS: SearchPolicy = SearchPolicy {
        surface_fetch_error: false,
        surface_invalid_path: false,
    };
}

/// One link of a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy<'a> {
    /// Random quote. Always replies.
    Quote,
    /// One catalog search; random pick over the result.
    Search {
        term: Option<&'a str>,
        topic: Option<&'a str>,
        policy: SearchPolicy,
    },
    /// Expand the seed into keywords and search each in order until one yields a valid photo.
    Expand {
        seed: &'a str,
        mode: ExpandMode,
        topic: Option<&'a str>,
    },
    /// Persona-styled line about the topic.
    Persona { topic: &'a str },
    /// Fixed text. Always replies.
    Fixed(String),
}

/// Fallback chain for an event, or `None` when the event is suppressed.
pub fn plan(event: &InboundEvent) -> Option<Vec<Strategy<'_>>> {
    if event.message_kind != MessageKind::Text {
        log::debug!("router: ignoring non-text message from {}", event.source_id);
        return None;
    }
    if event.source_kind == SourceKind::Unsupported {
        log::info!("router: ignoring message from unsupported source {:?}", event.source_id);
        return None;
    }
    let chain = match classify(&event.text) {
        Command::Greeting => vec![
            Strategy::Search {
                term: None,
                topic: None,
                policy: SearchPolicy::GREETING,
            },
            Strategy::Fixed(NO_PHOTO_TEXT.to_string()),
        ],
        Command::Quote => vec![Strategy::Quote],
        Command::Tag(tag) => vec![
            Strategy::Search {
                term: Some(tag),
                topic: Some(tag),
                policy: SearchPolicy::TAG,
            },
            Strategy::Expand {
                seed: tag,
                mode: ExpandMode::Tag,
                topic: Some(tag),
            },
            Strategy::Persona { topic: tag },
            Strategy::Fixed(tag_fallback_text(tag)),
        ],
        Command::FreeText(text) => {
            if event.source_kind != SourceKind::Individual {
                log::info!(
                    "router: ignoring free text in {:?} {}",
                    event.source_kind,
                    event.source_id
                );
                return None;
            }
            vec![
                Strategy::Search {
                    term: Some(text),
                    topic: None,
                    policy: SearchPolicy::GUESS,
                },
                Strategy::Expand {
                    seed: text,
                    mode: ExpandMode::FreeText,
                    topic: None,
                },
                Strategy::Persona { topic: text },
                Strategy::Fixed(free_text_fallback_text(text)),
            ]
        }
    };
    Some(chain)
}

/// Whether an event was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Replied,
    Suppressed,
}

/// Uniform draw over one search result. Fresh RNG handle per draw.
fn pick_random(photos: &[PhotoRecord]) -> Option<&PhotoRecord> {
    photos.choose(&mut rand::thread_rng())
}

/// Drives the fallback chain for each event. Shared read-only across concurrent events.
pub struct EventRouter {
    catalog: Arc<dyn PhotoCatalog>,
    composer: ReplyComposer,
    expander: KeywordExpander,
    responder: StyleResponder,
    quotes: Arc<QuoteBank>,
}

impl EventRouter {
    pub fn new(
        catalog: Arc<dyn PhotoCatalog>,
        generator: Arc<dyn TextGenerator>,
        composer: ReplyComposer,
        quotes: Arc<QuoteBank>,
    ) -> Self {
        Self {
            catalog,
            composer,
            expander: KeywordExpander::new(generator.clone()),
            responder: StyleResponder::new(generator),
            quotes,
        }
    }

    /// Router wired to the real photo API and Gemini; loads the quote bank once.
    pub fn from_settings(settings: &Settings) -> Self {
        let quotes = Arc::new(QuoteBank::load(&settings.quotes_path));
        let catalog = Arc::new(HttpPhotoCatalog::new(settings.photo_api_url.clone()));
        let generator = Arc::new(GeminiClient::new(
            settings.gemini_api_key.clone(),
            Some(settings.gemini_model.clone()),
            Some(settings.gemini_api_base.clone()),
        ));
        Self::new(
            catalog,
            generator,
            ReplyComposer::new(settings.photo_cdn_base_url.clone()),
            quotes,
        )
    }

    pub fn quotes(&self) -> &QuoteBank {
        &self.quotes
    }

    /// Decide the reply for an event without sending it. `None` means suppressed.
    pub async fn route(&self, event: &InboundEvent) -> Option<OutboundReply> {
        let chain = plan(event)?;
        for strategy in &chain {
            if let ControlFlow::Break(reply) = self.run(strategy).await {
                return Some(reply);
            }
        }
        log::warn!("router: chain for {:?} ended without a reply", event.text);
        None
    }

    /// Route the event and send the reply, consuming its token. At most one send per event.
    pub async fn handle(
        &self,
        event: InboundEvent,
        sender: &dyn ReplySender,
    ) -> Result<Dispatch, LineError> {
        let Some(reply) = self.route(&event).await else {
            return Ok(Dispatch::Suppressed);
        };
        sender.send_reply(event.reply_token, &reply).await?;
        Ok(Dispatch::Replied)
    }

    async fn run(&self, strategy: &Strategy<'_>) -> ControlFlow<OutboundReply> {
        match strategy {
            Strategy::Quote => {
                ControlFlow::Break(self.composer.text_reply_for(self.quotes.pick_random()))
            }
            Strategy::Search {
                term,
                topic,
                policy,
            } => self.search(*term, *topic, *policy).await,
            Strategy::Expand { seed, mode, topic } => self.expand(seed, *mode, *topic).await,
            Strategy::Persona { topic } => self.persona(topic).await,
            Strategy::Fixed(text) => ControlFlow::Break(self.composer.text_reply_for(text.clone())),
        }
    }

    async fn search(
        &self,
        term: Option<&str>,
        topic: Option<&str>,
        policy: SearchPolicy,
    ) -> ControlFlow<OutboundReply> {
        let photos = match self.catalog.search(term).await {
            Ok(photos) => photos,
            Err(e) => {
                log::warn!("router: photo search {:?} failed: {}", term, e);
                if policy.surface_fetch_error {
                    let message = e.user_message(term.unwrap_or_default());
                    return ControlFlow::Break(self.composer.text_reply_for(message));
                }
                return ControlFlow::Continue(());
            }
        };
        let Some(photo) = pick_random(&photos) else {
            log::debug!("router: no photos for {:?}", term);
            return ControlFlow::Continue(());
        };
        match self.composer.image_reply_for(photo, topic) {
            Ok(reply) => ControlFlow::Break(reply),
            Err(e) => {
                log::warn!("router: {}", e);
                if policy.surface_invalid_path {
                    ControlFlow::Break(self.composer.text_reply_for(INVALID_PHOTO_TEXT))
                } else {
                    ControlFlow::Continue(())
                }
            }
        }
    }

    /// Keywords are tried in the model's order; a failing keyword never stops the loop.
    async fn expand(
        &self,
        seed: &str,
        mode: ExpandMode,
        topic: Option<&str>,
    ) -> ControlFlow<OutboundReply> {
        let keywords = self.expander.expand(seed, mode.default_limit(), mode).await;
        for keyword in &keywords {
            let photos = match self.catalog.search(Some(keyword.as_str())).await {
                Ok(photos) => photos,
                Err(e) => {
                    log::warn!("router: keyword {:?} search failed: {}", keyword, e);
                    continue;
                }
            };
            let Some(photo) = pick_random(&photos) else {
                log::debug!("router: no photos for keyword {:?}", keyword);
                continue;
            };
            match self.composer.image_reply_for(photo, topic) {
                Ok(reply) => {
                    log::info!("router: keyword {:?} matched for {:?}", keyword, seed);
                    return ControlFlow::Break(reply);
                }
                Err(e) => log::warn!("router: keyword {:?}: {}", keyword, e),
            }
        }
        ControlFlow::Continue(())
    }

    async fn persona(&self, topic: &str) -> ControlFlow<OutboundReply> {
        match self
            .responder
            .respond_in_style(topic, self.quotes.style_context())
            .await
        {
            Ok(line) => ControlFlow::Break(self.composer.text_reply_for(line)),
            Err(e) => {
                log::warn!("router: persona reply for {:?} failed: {}", topic, e);
                ControlFlow::Continue(())
            }
        }
    }
}
