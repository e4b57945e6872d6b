use forecast_core::{NewsItem, NewsReason, SentimentTag};
use serde::{Deserialize, Serialize};

/// Number of ranked headlines tagged per analysis when nothing else is configured
pub const DEFAULT_TOP_K: usize = 5;

const POSITIVE_KEYWORDS: &[&str] = &[
    "earnings", "beat", "surprise", "upgrade", "buy", "growth", "profit", "revenue", "strong",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "miss", "downgrade", "sell", "loss", "decline", "weak", "concern", "warning", "cut",
];

/// Keywords for one sentiment. Rules are checked in order and the first
/// rule with any matching keyword decides the tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub sentiment: SentimentTag,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(sentiment: SentimentTag, keywords: &[&str]) -> Self {
        Self {
            sentiment,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

/// Keyword-table sentiment tagger for headlines.
///
/// Matching is plain substring search over the lower-cased title and summary,
/// so "upgrades" matches "upgrade" and "buyback" matches "buy". Positive
/// keywords take priority over negative ones when both appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentTagger {
    rules: Vec<KeywordRule>,
    top_k: usize,
}

impl SentimentTagger {
    pub fn new() -> Self {
        Self {
            rules: vec![
                KeywordRule::new(SentimentTag::Positive, POSITIVE_KEYWORDS),
                KeywordRule::new(SentimentTag::Negative, NEGATIVE_KEYWORDS),
            ],
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Tagger with a custom rule table. Rule order is precedence order.
    pub fn with_rules(rules: Vec<KeywordRule>) -> Self {
        Self {
            rules,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// Add keywords to the rule for `sentiment`, appending a new lowest-priority
    /// rule if the table has none for it.
    pub fn extend_keywords(&mut self, sentiment: SentimentTag, keywords: &[&str]) {
        let lowered = keywords.iter().map(|k| k.to_lowercase());
        match self.rules.iter_mut().find(|r| r.sentiment == sentiment) {
            Some(rule) => rule.keywords.extend(lowered),
            None => self.rules.push(KeywordRule {
                sentiment,
                keywords: lowered.collect(),
            }),
        }
    }

    /// Tag a single headline
    pub fn tag(&self, item: &NewsItem) -> SentimentTag {
        let text = format!(
            "{} {}",
            item.title,
            item.summary.as_deref().unwrap_or("")
        )
        .to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.matches(&text))
            .map(|rule| rule.sentiment)
            .unwrap_or(SentimentTag::Neutral)
    }

    /// Tag the first `top_k` items of an already ranked list.
    ///
    /// The returned reasons feed both the "why did it move" list and the
    /// news signal of the forecast, so both always see the same headlines.
    pub fn tag_top(&self, ranked: &[NewsItem]) -> Vec<NewsReason> {
        ranked
            .iter()
            .take(self.top_k)
            .map(|item| NewsReason {
                title: item.title.clone(),
                publisher: item.publisher.clone(),
                sentiment: self.tag(item),
            })
            .collect()
    }
}

impl Default for SentimentTagger {
    fn default() -> Self {
        Self::new()
    }
}

/// Tag a headline with the default keyword table
pub fn tag(item: &NewsItem) -> SentimentTag {
    SentimentTagger::new().tag(item)
}

/// (positive, negative) counts over a set of tagged headlines
pub fn count_sentiment(reasons: &[NewsReason]) -> (usize, usize) {
    reasons.iter().fold((0, 0), |(pos, neg), r| match r.sentiment {
        SentimentTag::Positive => (pos + 1, neg),
        SentimentTag::Negative => (pos, neg + 1),
        SentimentTag::Neutral => (pos, neg),
    })
}
