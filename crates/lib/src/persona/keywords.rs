//! Keyword expansion: ask the model for alternative search terms and keep only well-formed ones.

use std::sync::Arc;

use crate::llm::TextGenerator;
use crate::persona::PERSONA_NAME;

/// Longest keyword accepted in tag mode, in characters.
const TAG_KEYWORD_MAX_CHARS: usize = 6;

/// Which prompt to use and how strictly to filter the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandMode {
    /// A tag search came back empty: ask for close synonyms. Short CJK/digit keywords only.
    Tag,
    /// Free chat: let the model react in persona and pull searchable keywords out of it.
    FreeText,
}

impl ExpandMode {
    /// Candidate limit used by the router for this mode.
    pub fn default_limit(self) -> usize {
        match self {
            ExpandMode::Tag => 3,
            ExpandMode::FreeText => 10,
        }
    }

    fn prompt(self, seed: &str, max_count: usize) -> String {
        match self {
            ExpandMode::Tag => format!(
                "你是相簿搜尋助手。使用者想找「{seed}」的照片，但相簿裡沒有這個標籤。\n\
                 請列出最多 {max_count} 個意思相近、可能出現在相簿標籤裡的中文關鍵字，每個不超過 {TAG_KEYWORD_MAX_CHARS} 個字。\n\
                 只輸出關鍵字，用逗號分隔，不要編號、不要任何說明。"
            ),
            ExpandMode::FreeText => format!(
                "你是一位說話直白、愛喊口號的政治人物，大家都叫你「{PERSONA_NAME}」。有人對你說：「{seed}」\n\
                 先想想你會怎麼回應，再從這段對話挑出最多 {max_count} 個適合拿來搜尋照片的關鍵字。\n\
                 只輸出關鍵字，用逗號分隔，不要包含「{PERSONA_NAME}」，不要任何說明。"
            ),
        }
    }

    fn accepts(self, keyword: &str) -> bool {
        if keyword.is_empty() || keyword.contains(PERSONA_NAME) {
            return false;
        }
        match self {
            ExpandMode::Tag => {
                let len = keyword.chars().count();
                (1..=TAG_KEYWORD_MAX_CHARS).contains(&len)
                    && keyword.chars().all(|c| is_cjk_ideograph(c) || c.is_ascii_digit())
            }
            ExpandMode::FreeText => true,
        }
    }
}

fn is_cjk_ideograph(c: char) -> bool {
    matches!(
        c,
        '\u{4E00}'..='\u{9FFF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{20000}'..='\u{2A6DF}'
    )
}

/// Split a raw model answer into accepted keywords, in the model's order, at most `max_count`.
pub(crate) fn parse_keywords(raw: &str, max_count: usize, mode: ExpandMode) -> Vec<String> {
    raw.split([',', '，'])
        .map(str::trim)
        .filter(|k| mode.accepts(k))
        .take(max_count)
        .map(str::to_string)
        .collect()
}

/// Wraps one generative call per expansion. Failures yield no keywords; nothing is retried.
#[derive(Clone)]
pub struct KeywordExpander {
    generator: Arc<dyn TextGenerator>,
}

impl KeywordExpander {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn expand(&self, seed: &str, max_count: usize, mode: ExpandMode) -> Vec<String> {
        let prompt = mode.prompt(seed, max_count);
        let raw = match self.generator.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("keywords: expansion of {:?} failed: {}", seed, e);
                return Vec::new();
            }
        };
        let keywords = parse_keywords(&raw, max_count, mode);
        log::debug!(
            "keywords: {:?} ({:?}) -> {:?} from {:?}",
            seed,
            mode,
            keywords,
            raw.trim()
        );
        keywords
    }
}
