//! Text analysis strategies selected by analyzer configuration.
//!
//! An analyzer configuration arrives as JSON in one of these shapes:
//!
//! ```text
//! "standard"                                        named kind
//! {"name": "standard", "stopwords": ["a", "the"]}   named kind with options
//! ["standard", {"stopwords": ["a"]}]                tuple form
//! {"name": "perfield", "default": <cfg>, "fields": {"title": <cfg>}}
//! ["perfield", <cfg>, {"title": <cfg>}]
//! ```
//!
//! The resulting [`Analyzer`] is registered with the session's index so
//! the writer and the query parser tokenize identically.

use crate::core::error::{IndexdError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tantivy::schema::is_valid_field_name;
use tantivy::tokenizer::{
    Language, LowerCaser, RawTokenizer, RemoveLongFilter, SimpleTokenizer, Stemmer,
    StopWordFilter, TextAnalyzer, TokenStream, TokenizerManager, WhitespaceTokenizer,
};

/// Tokenizer name used by the `default` field
pub const DEFAULT_TOKENIZER: &str = "indexd_default";

/// Field holding the document identifier
pub const ID_FIELD: &str = "_id";

/// Catch-all text field, also the query parser's default field
pub const DEFAULT_FIELD: &str = "default";

/// Tokens longer than this are dropped by the standard analyzers
const MAX_TOKEN_LENGTH: usize = 255;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Built-in analysis kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerKind {
    /// Word tokens, lowercased, overlong tokens removed
    Standard,
    /// Word tokens, lowercased
    Simple,
    /// Whitespace-separated tokens, lowercased
    Whitespace,
    /// Whole value as a single token
    Keyword,
    /// Standard plus English stop words and stemming
    English,
}

impl AnalyzerKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "standard" | "classic" => Some(Self::Standard),
            "simple" => Some(Self::Simple),
            "whitespace" => Some(Self::Whitespace),
            "keyword" => Some(Self::Keyword),
            "english" => Some(Self::English),
            _ => None,
        }
    }

    fn accepts_stopwords(self) -> bool {
        !matches!(self, Self::Keyword)
    }
}

/// Decoded analyzer configuration
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerConfig {
    Named {
        kind: AnalyzerKind,
        stopwords: Option<Vec<String>>,
    },
    PerField {
        default: Box<AnalyzerConfig>,
        fields: BTreeMap<String, AnalyzerConfig>,
    },
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig::Named {
            kind: AnalyzerKind::Standard,
            stopwords: None,
        }
    }
}

impl AnalyzerConfig {
    /// Decode a configuration from its JSON shape
    pub fn from_value(value: &Value) -> Result<Self> {
        Self::decode(value, true)
    }

    fn decode(value: &Value, allow_perfield: bool) -> Result<Self> {
        match value {
            Value::String(name) => Self::named(name, None, allow_perfield),
            Value::Object(map) => {
                let name = map.get("name").and_then(Value::as_str).ok_or_else(|| {
                    IndexdError::InvalidAnalyzerConfig("missing analyzer name".to_string())
                })?;
                if name == "perfield" {
                    if !allow_perfield {
                        return Err(nested_perfield());
                    }
                    return Self::perfield(map.get("default"), map.get("fields"));
                }
                Self::named(name, map.get("stopwords"), allow_perfield)
            }
            Value::Array(items) => {
                let name = items.first().and_then(Value::as_str).ok_or_else(|| {
                    IndexdError::InvalidAnalyzerConfig(
                        "tuple config must start with an analyzer name".to_string(),
                    )
                })?;
                if name == "perfield" {
                    if !allow_perfield {
                        return Err(nested_perfield());
                    }
                    return Self::perfield(items.get(1), items.get(2));
                }
                let stopwords = match items.get(1) {
                    Some(Value::Object(options)) => options.get("stopwords"),
                    Some(other) => {
                        return Err(IndexdError::InvalidAnalyzerConfig(format!(
                            "unexpected analyzer options: {other}"
                        )))
                    }
                    None => None,
                };
                Self::named(name, stopwords, allow_perfield)
            }
            other => Err(IndexdError::InvalidAnalyzerConfig(format!(
                "unsupported analyzer config: {other}"
            ))),
        }
    }

    fn named(name: &str, stopwords: Option<&Value>, allow_perfield: bool) -> Result<Self> {
        if name == "perfield" {
            if !allow_perfield {
                return Err(nested_perfield());
            }
            return Self::perfield(None, None);
        }

        let kind = AnalyzerKind::from_name(name).ok_or_else(|| {
            IndexdError::InvalidAnalyzerConfig(format!("unknown analyzer: {name}"))
        })?;

        let stopwords = match stopwords {
            None | Some(Value::Null) => None,
            Some(_) if !kind.accepts_stopwords() => {
                return Err(IndexdError::InvalidAnalyzerConfig(format!(
                    "analyzer {name} does not take stopwords"
                )))
            }
            Some(Value::Array(words)) => Some(
                words
                    .iter()
                    .map(|w| {
                        w.as_str().map(str::to_string).ok_or_else(|| {
                            IndexdError::InvalidAnalyzerConfig(format!("stopword is not a string: {w}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            Some(other) => {
                return Err(IndexdError::InvalidAnalyzerConfig(format!(
                    "stopwords must be a list: {other}"
                )))
            }
        };

        Ok(AnalyzerConfig::Named { kind, stopwords })
    }

    fn perfield(default: Option<&Value>, fields: Option<&Value>) -> Result<Self> {
        let default = match default {
            Some(value) => Self::decode(value, false)?,
            None => AnalyzerConfig::default(),
        };

        let mut decoded = BTreeMap::new();
        match fields {
            None | Some(Value::Null) => {}
            Some(Value::Object(map)) => {
                for (field, value) in map {
                    if field == ID_FIELD || field == DEFAULT_FIELD {
                        return Err(IndexdError::InvalidAnalyzerConfig(format!(
                            "field name {field:?} cannot be overridden"
                        )));
                    }
                    if !is_valid_field_name(field) {
                        return Err(IndexdError::InvalidAnalyzerConfig(format!(
                            "invalid field name {field:?}"
                        )));
                    }
                    decoded.insert(field.clone(), Self::decode(value, false)?);
                }
            }
            Some(other) => {
                return Err(IndexdError::InvalidAnalyzerConfig(format!(
                    "perfield overrides must be an object: {other}"
                )))
            }
        }

        Ok(AnalyzerConfig::PerField {
            default: Box::new(default),
            fields: decoded,
        })
    }
}

fn nested_perfield() -> IndexdError {
    IndexdError::InvalidAnalyzerConfig("perfield analyzers cannot be nested".to_string())
}

/// Text analysis strategy for one session
#[derive(Clone)]
pub struct Analyzer {
    default: TextAnalyzer,
    fields: BTreeMap<String, TextAnalyzer>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Analyzer {
    /// Build an analyzer from decoded configuration
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        match config {
            AnalyzerConfig::Named { kind, stopwords } => Self {
                default: build(*kind, stopwords.as_deref()),
                fields: BTreeMap::new(),
            },
            AnalyzerConfig::PerField { default, fields } => Self {
                default: Self::from_config(default).default,
                fields: fields
                    .iter()
                    .map(|(name, cfg)| (name.clone(), Self::from_config(cfg).default))
                    .collect(),
            },
        }
    }

    /// Decode and build in one step
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self::from_config(&AnalyzerConfig::from_value(value)?))
    }

    /// Fields with a dedicated analyzer
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Tokenizer name a field is indexed with
    pub fn tokenizer_name(field: &str) -> String {
        format!("indexd_field_{field}")
    }

    /// Make every analyzer available to an index under its tokenizer name
    pub fn register(&self, tokenizers: &TokenizerManager) {
        tokenizers.register(DEFAULT_TOKENIZER, self.default.clone());
        for (field, analyzer) in &self.fields {
            tokenizers.register(&Self::tokenizer_name(field), analyzer.clone());
        }
    }

    /// Tokens produced for `text` when indexed into `field`
    pub fn analyze(&self, field: &str, text: &str) -> Vec<String> {
        let mut analyzer = self
            .fields
            .get(field)
            .unwrap_or(&self.default)
            .clone();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }
}

fn build(kind: AnalyzerKind, stopwords: Option<&[String]>) -> TextAnalyzer {
    let stop = |defaults: &[&str]| {
        StopWordFilter::remove(match stopwords {
            Some(words) => words.to_vec(),
            None => defaults.iter().map(|w| w.to_string()).collect(),
        })
    };

    match kind {
        AnalyzerKind::Standard => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
            .filter(LowerCaser)
            .filter(stop(&[]))
            .build(),
        AnalyzerKind::Simple => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(stop(&[]))
            .build(),
        AnalyzerKind::Whitespace => TextAnalyzer::builder(WhitespaceTokenizer::default())
            .filter(LowerCaser)
            .filter(stop(&[]))
            .build(),
        AnalyzerKind::Keyword => TextAnalyzer::builder(RawTokenizer::default()).build(),
        AnalyzerKind::English => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
            .filter(LowerCaser)
            .filter(stop(ENGLISH_STOP_WORDS))
            .filter(Stemmer::new(Language::English))
            .build(),
    }
}
