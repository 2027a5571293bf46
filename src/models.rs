use crate::config::MISSING_ID;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// A field value inside a record.
///
/// Records arrive as loosely shaped JSON, so values are a recursive tree.
/// Only scalar leaves can produce blocking keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Steps one path segment down. Numeric segments index into lists.
    pub fn child(&self, segment: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(segment),
            Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Text fed to key generation. `None` for null and container values.
    pub fn as_key_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Integer(n) => Some(Cow::Owned(itoa::Buffer::new().format(*n).to_owned())),
            Value::Float(f) => Some(Cow::Owned(f.to_string())),
            Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            Value::Null | Value::List(_) | Value::Map(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Map(record.fields)
    }
}

/// A caller-owned record: field name to value, with dot-path lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a top-level field.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Resolves a dot-separated path such as `address.city` or `emails.0`.
    /// Missing segments resolve to `None`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = self.fields.get(segments.next()?)?;
        segments.try_fold(first, |current, segment| current.child(segment))
    }

    /// Scalar text at `path`, if any.
    pub fn text(&self, path: &str) -> Option<Cow<'_, str>> {
        self.get(path)?.as_key_text()
    }

    /// Id used for pair canonicalization. Records without one all share
    /// [`MISSING_ID`].
    pub fn id_text(&self, id_field: &str) -> Cow<'_, str> {
        self.text(id_field).unwrap_or(Cow::Borrowed(MISSING_ID))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Key-generation strategy of a blocking config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum BlockingMethod {
    Exact,
    Prefix,
    Suffix,
    Soundex,
    ColognePhonetic,
    Ngram,
    Metaphone,
    Normalized,
    Composite,
}

impl BlockingMethod {
    pub const ALL: [BlockingMethod; 9] = [
        BlockingMethod::Exact,
        BlockingMethod::Prefix,
        BlockingMethod::Suffix,
        BlockingMethod::Soundex,
        BlockingMethod::ColognePhonetic,
        BlockingMethod::Ngram,
        BlockingMethod::Metaphone,
        BlockingMethod::Normalized,
        BlockingMethod::Composite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
            Self::Soundex => "soundex",
            Self::ColognePhonetic => "cologne_phonetic",
            Self::Ngram => "ngram",
            Self::Metaphone => "metaphone",
            Self::Normalized => "normalized",
            Self::Composite => "composite",
        }
    }

    /// Strict lookup by name. Accepts snake_case, camelCase and kebab-case.
    pub fn from_name(name: &str) -> Option<Self> {
        let folded: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "exact" => Some(Self::Exact),
            "prefix" => Some(Self::Prefix),
            "suffix" => Some(Self::Suffix),
            "soundex" => Some(Self::Soundex),
            "colognephonetic" | "cologne" | "koelnerphonetik" => Some(Self::ColognePhonetic),
            "ngram" => Some(Self::Ngram),
            "metaphone" => Some(Self::Metaphone),
            "normalized" | "normalised" => Some(Self::Normalized),
            "composite" => Some(Self::Composite),
            _ => None,
        }
    }
}

/// Unrecognized names fall back to [`BlockingMethod::Normalized`].
impl From<String> for BlockingMethod {
    fn from(name: String) -> Self {
        Self::from_name(&name).unwrap_or_else(|| {
            warn!(method = %name, "Unknown blocking method, using normalized value");
            Self::Normalized
        })
    }
}

impl fmt::Display for BlockingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-config tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyOptions {
    /// n for prefix, suffix and n-gram keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    pub case_sensitive: bool,
    pub skip_normalization: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingKeyConfig {
    pub fields: Vec<String>,
    pub method: BlockingMethod,
    #[serde(default)]
    pub options: KeyOptions,
}

impl BlockingKeyConfig {
    pub fn new<I, S>(fields: I, method: BlockingMethod) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            method,
            options: KeyOptions::default(),
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.options.length = Some(length);
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.options.case_sensitive = true;
        self
    }

    /// Feed field values to the generator without normalizing them first.
    pub fn raw(mut self) -> Self {
        self.options.skip_normalization = true;
        self
    }
}

/// One key produced by applying a config to one field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BlockingKey {
    pub key: String,
    pub method: BlockingMethod,
    pub field: String,
}

impl BlockingKey {
    /// Composite block identifier, `method:field:key`.
    pub fn block_key(&self) -> String {
        let mut out =
            String::with_capacity(self.method.as_str().len() + self.field.len() + self.key.len() + 2);
        out.push_str(self.method.as_str());
        out.push(':');
        out.push_str(&self.field);
        out.push(':');
        out.push_str(&self.key);
        out
    }
}

/// Two records worth a full similarity comparison.
#[derive(Debug, Clone, Copy)]
pub struct CandidatePair<'a> {
    pub left: &'a Record,
    pub right: &'a Record,
}

impl<'a> CandidatePair<'a> {
    pub fn ids(&self, id_field: &str) -> (Cow<'a, str>, Cow<'a, str>) {
        (self.left.id_text(id_field), self.right.id_text(id_field))
    }
}
