//! Query parameter schema: typed values, per-key specs and the
//! parse/format pair built on `url::form_urlencoded`.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};
use url::form_urlencoded;

use crate::error::{Result, SyncError};

/// Separator for list-valued keys.
pub const LIST_SEPARATOR: char = ',';

// == Param Value ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    List(Vec<String>),
    Unset,
}

impl ParamValue {
    pub fn text(value: impl Into<String>) -> Self {
        ParamValue::Text(value.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> &[String] {
        match self {
            ParamValue::List(items) => items,
            _ => &[],
        }
    }

    /// Raw string form, or `None` when there is nothing to emit.
    fn encode(&self) -> Option<String> {
        match self {
            ParamValue::Text(s) => Some(s.clone()),
            ParamValue::Int(n) => Some(n.to_string()),
            ParamValue::List(items) if items.is_empty() => None,
            ParamValue::List(items) => Some(items.join(&LIST_SEPARATOR.to_string())),
            ParamValue::Unset => None,
        }
    }
}

impl From<Option<i64>> for ParamValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(ParamValue::Unset, ParamValue::Int)
    }
}

// == Param Map ==
/// Structured query state keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap(BTreeMap<String, ParamValue>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        self.0.insert(key.into(), value);
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_text)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ParamValue::as_int)
    }

    pub fn list(&self, key: &str) -> &[String] {
        self.get(key).map_or(&[], ParamValue::as_list)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// == Param Spec ==
type ScalarDecoder = Box<dyn Fn(&str) -> Result<ParamValue>>;
type ItemDecoder = Box<dyn Fn(&str) -> Result<String>>;

enum Decoder {
    Scalar(ScalarDecoder),
    List(ItemDecoder),
}

/// Default value plus deserializer for one recognized key.
///
/// Deserializers must be idempotent over their own output, which is what
/// makes `format` a fixed point of `parse`.
pub struct ParamSpec {
    default: ParamValue,
    decoder: Decoder,
}

impl ParamSpec {
    /// Custom scalar key.
    pub fn scalar<F>(default: ParamValue, decode: F) -> Self
    where
        F: Fn(&str) -> Result<ParamValue> + 'static,
    {
        Self {
            default,
            decoder: Decoder::Scalar(Box::new(decode)),
        }
    }

    /// Free text, default empty.
    pub fn text() -> Self {
        Self::scalar(ParamValue::text(""), |raw| Ok(ParamValue::text(raw)))
    }

    /// Integer `>= 1`.
    pub fn positive_int(default: i64) -> Self {
        Self::scalar(ParamValue::Int(default), |raw| match raw.trim().parse::<i64>() {
            Ok(n) if n >= 1 => Ok(ParamValue::Int(n)),
            Ok(n) => Err(SyncError::invalid_param(raw, format!("{n} is not positive"))),
            Err(e) => Err(SyncError::invalid_param(raw, e)),
        })
    }

    /// Integer with no default.
    pub fn optional_int() -> Self {
        Self::scalar(ParamValue::Unset, |raw| {
            raw.trim()
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|e| SyncError::invalid_param(raw, e))
        })
    }

    /// One of a closed set of words.
    pub fn one_of(default: &'static str, allowed: &'static [&'static str]) -> Self {
        Self::scalar(ParamValue::text(default), move |raw| {
            allowed
                .iter()
                .find(|word| **word == raw)
                .map(|word| ParamValue::text(*word))
                .ok_or_else(|| SyncError::invalid_param(raw, "not an allowed value"))
        })
    }

    /// Separator-joined list of free strings, default empty.
    pub fn list() -> Self {
        Self::list_of(|item| Ok(item.to_string()))
    }

    /// Separator-joined list whose items each pass `decode_item`.
    pub fn list_of<F>(decode_item: F) -> Self
    where
        F: Fn(&str) -> Result<String> + 'static,
    {
        Self {
            default: ParamValue::List(Vec::new()),
            decoder: Decoder::List(Box::new(decode_item)),
        }
    }

    pub fn default_value(&self) -> &ParamValue {
        &self.default
    }

    /// Deserializes one raw value. Blank input means "use the default".
    pub fn decode(&self, key: &str, raw: &str) -> Result<ParamValue> {
        if raw.trim().is_empty() {
            return Ok(self.default.clone());
        }
        match &self.decoder {
            Decoder::Scalar(decode) => decode(raw).map_err(|e| rekey(key, e)),
            Decoder::List(decode_item) => {
                let items = raw
                    .split(LIST_SEPARATOR)
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .filter_map(|item| match decode_item(item) {
                        Ok(item) => Some(item),
                        Err(e) => {
                            debug!(key, item, error = %e, "Dropping list item");
                            None
                        }
                    })
                    .collect();
                Ok(ParamValue::List(items))
            }
        }
    }
}

/// Deserializers only know the raw text; attach the key they ran for.
fn rekey(key: &str, err: SyncError) -> SyncError {
    match err {
        SyncError::InvalidParam { reason, .. } => SyncError::invalid_param(key, reason),
        other => other,
    }
}

// == Schema ==
/// Ordered set of recognized keys. Formatting follows declaration order.
#[derive(Default)]
pub struct QueryParamSchema {
    params: Vec<(&'static str, ParamSpec)>,
}

impl fmt::Debug for QueryParamSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.params.iter().map(|(key, _)| key))
            .finish()
    }
}

impl QueryParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: &'static str, spec: ParamSpec) -> Self {
        self.params.retain(|(existing, _)| *existing != key);
        self.params.push((key, spec));
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().map(|(key, _)| *key)
    }

    pub fn spec(&self, key: &str) -> Option<&ParamSpec> {
        self.params
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, spec)| spec)
    }

    /// Every recognized key at its default.
    pub fn defaults(&self) -> ParamMap {
        let mut map = ParamMap::new();
        for (key, spec) in &self.params {
            map.insert(*key, spec.default.clone());
        }
        map
    }

    // == Parse ==
    /// Parses a query string (leading `?` optional) into a full map:
    /// defaults overlaid with every recognized key that deserializes.
    pub fn parse(&self, query: &str) -> ParamMap {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut map = self.defaults();

        for (key, raw) in form_urlencoded::parse(query.as_bytes()) {
            let Some(spec) = self.spec(&key) else {
                debug!(key = %key, "Ignoring unrecognized query parameter");
                continue;
            };
            match spec.decode(&key, &raw) {
                Ok(value) => map.insert(key.into_owned(), value),
                Err(e) => {
                    warn!(key = %key, error = %e, "Malformed query parameter, using default");
                    map.insert(key.into_owned(), spec.default.clone());
                }
            }
        }
        map
    }

    // == Format ==
    /// Emits only keys whose value differs from the default, in schema
    /// order. Values are canonicalized through their own deserializer
    /// first, so `format(parse(format(m))) == format(m)`.
    pub fn format(&self, params: &ParamMap) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());

        for (key, spec) in &self.params {
            let value = params.get(key).unwrap_or(&spec.default);
            let Some(canonical) = value.encode().and_then(|raw| spec.decode(key, &raw).ok()) else {
                continue;
            };
            if canonical == spec.default {
                continue;
            }
            if let Some(raw) = canonical.encode() {
                serializer.append_pair(key, &raw);
            }
        }
        serializer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> QueryParamSchema {
        QueryParamSchema::new()
            .param("q", ParamSpec::text())
            .param("sort", ParamSpec::one_of("relevance", &["relevance", "rarity"]))
            .param("page", ParamSpec::positive_int(1))
            .param("tags", ParamSpec::list())
            .param("min", ParamSpec::optional_int())
    }

    #[test]
    fn test_defaults_format_to_empty() {
        let schema = schema();
        assert_eq!(schema.format(&schema.defaults()), "");
        assert_eq!(schema.format(&ParamMap::new()), "");
    }

    #[test]
    fn test_page_scenario() {
        let schema = QueryParamSchema::new().param("page", ParamSpec::positive_int(1));

        let page_one = ParamMap::new().with("page", ParamValue::Int(1));
        assert_eq!(schema.format(&page_one), "");

        let page_two = ParamMap::new().with("page", ParamValue::Int(2));
        assert_eq!(schema.format(&page_two), "page=2");

        assert_eq!(schema.parse("page=2").int("page"), Some(2));
        assert_eq!(schema.parse("").int("page"), Some(1));
        assert_eq!(schema.parse("?other=1").int("page"), Some(1));
    }

    #[test]
    fn test_malformed_key_falls_back_alone() {
        let schema = schema();
        let map = schema.parse("q=zelda&page=NaN&sort=bogus&min=-5");

        assert_eq!(map.text("q"), Some("zelda"));
        assert_eq!(map.int("page"), Some(1));
        assert_eq!(map.text("sort"), Some("relevance"));
        assert_eq!(map.int("min"), Some(-5));
    }

    #[test]
    fn test_non_positive_page_is_default() {
        assert_eq!(schema().parse("page=0").int("page"), Some(1));
        assert_eq!(schema().parse("page=-3").int("page"), Some(1));
    }

    #[test]
    fn test_list_drops_empty_items() {
        let map = schema().parse("tags=co-op,,%20indie%20,");
        assert_eq!(map.list("tags"), ["co-op", "indie"]);
    }

    #[test]
    fn test_list_of_drops_invalid_items() {
        let schema = QueryParamSchema::new().param(
            "n",
            ParamSpec::list_of(|item| {
                item.parse::<u8>()
                    .map(|n| n.to_string())
                    .map_err(|e| SyncError::invalid_param("n", e))
            }),
        );
        assert_eq!(schema.parse("n=1,x,3").list("n"), ["1", "3"]);
    }

    #[test]
    fn test_format_joins_lists_in_schema_order() {
        let schema = schema();
        let map = ParamMap::new()
            .with("tags", ParamValue::list(["a", "b"]))
            .with("page", ParamValue::Int(3))
            .with("q", ParamValue::text("hollow knight"));

        assert_eq!(schema.format(&map), "q=hollow+knight&page=3&tags=a%2Cb");
    }

    #[test]
    fn test_format_omits_values_that_would_not_parse() {
        let schema = schema();
        let map = ParamMap::new()
            .with("page", ParamValue::Int(0))
            .with("sort", ParamValue::text("nope"))
            .with("tags", ParamValue::list(["", "  "]));

        assert_eq!(schema.format(&map), "");
    }

    #[test]
    fn test_parse_format_round_trip() {
        let schema = schema();
        let query = "q=a%26b&sort=rarity&page=4&tags=x%2Cy&min=7";
        assert_eq!(schema.format(&schema.parse(query)), query);
    }

    #[test]
    fn test_last_duplicate_wins() {
        assert_eq!(schema().parse("page=2&page=5").int("page"), Some(5));
    }
}
