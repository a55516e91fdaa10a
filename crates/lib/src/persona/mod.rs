//! Generative-text helpers that speak for (or search on behalf of) the persona.
//!
//! - `keywords`: turn one seed phrase into candidate photo-search keywords.
//! - `style`: write a one-line reply in the persona's voice.

mod keywords;
mod style;

pub use keywords::{ExpandMode, KeywordExpander};
pub use style::StyleResponder;

/// The persona's own name. Never accepted as a keyword, never allowed in a persona reply.
pub const PERSONA_NAME: &str = "院長";
