//! Gateway wire codec
//!
//! Outbound bodies are `Key=Value` pairs joined by `&` and URL-encoded.
//! Registration responses come back as `Key=Value` pairs joined by CRLF,
//! notifications as an ordinary form body.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::ser::{Serialize, SerializeMap, Serializer};
use url::form_urlencoded;

use crate::error::{GatewayError, GatewayResult};

/// Insertion-ordered set of named wire fields.
///
/// Empty values are never stored, so "present" always means "non-empty".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    pairs: Vec<(String, String)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`. An empty value removes the key instead.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        if value.is_empty() {
            self.remove(&key);
            return;
        }

        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn insert_opt<V: AsRef<str>>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.insert(key, value.as_ref());
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(index).1)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    /// Returns the value of `key` or a decode error naming it.
    pub fn require(&self, key: &str) -> GatewayResult<&str> {
        self.get(key).ok_or_else(|| GatewayError::decode(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// JSON rendering used for diagnostics.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = FieldSet::new();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (key, value) in &self.pairs {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Encodes the field set as a UTF-8 `application/x-www-form-urlencoded` body.
pub fn encode(fields: &FieldSet) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields.iter() {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Encodes the field set with every value narrowed to ISO-8859-1 bytes before
/// percent-encoding, which is the charset the gateway expects.
pub fn encode_latin1(fields: &FieldSet) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            let bytes: Vec<u8> = value.chars().map(latin1_byte).collect();
            format!(
                "{}={}",
                form_urlencoded::byte_serialize(key.as_bytes()).collect::<String>(),
                form_urlencoded::byte_serialize(&bytes).collect::<String>()
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Decodes a registration response body.
///
/// CRLF separators become `&` before URL-decoding; bodies that already use
/// `&` decode unchanged.
pub fn decode_response(body: &str) -> GatewayResult<FieldSet> {
    let normalised = body.trim().replace("\r\n", "&").replace('\n', "&");
    decode_form(&normalised)
}

/// Decodes a URL-encoded form body such as a notification POST.
pub fn decode_form(body: &str) -> GatewayResult<FieldSet> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(body)?;
    Ok(pairs.into_iter().collect())
}

/// Replaces every character the single-byte charset cannot carry with `?`.
pub fn transliterate(value: &str) -> String {
    value
        .chars()
        .map(|c| if (c as u32) <= 0xFF { c } else { '?' })
        .collect()
}

fn latin1_byte(c: char) -> u8 {
    u8::try_from(c as u32).unwrap_or(b'?')
}

/// Rounds to two decimals, half away from zero.
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Renders an amount with exactly two decimals, as rounded by [`round_amount`].
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", round_amount(amount))
}
