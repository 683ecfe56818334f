//! Codec of AFL style test case file names, e.g. `id:000001,src:000000,op:flip1,pos:0,+cov`.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("missing token: {0}")]
    MissingToken(&'static str),
    #[error("bad number in token '{key}': {value}")]
    BadNumber { key: String, value: String },
}

/// Tokens of a decoded file name, in the order they appeared.
///
/// A key appearing twice keeps the position of its first occurrence and the
/// value of the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameInfo {
    tokens: Vec<(String, Option<String>)>,
}

pub fn decode(name: &str) -> Result<NameInfo, DecodeError> {
    let mut info = NameInfo::default();
    for token in name.split(',') {
        let parts = token.split(':').collect::<Vec<_>>();
        let (key, value) = match parts.as_slice() {
            [flag] => (*flag, None),
            [key, value] => (*key, Some(value.to_string())),
            // big endian value annotation: val:be:+512
            ["val", "be", v] => ("val", Some(format!("be:{}", v))),
            // emitted by qsym when syncing: src:id:000008
            ["src", "id", v] => ("src", Some(v.to_string())),
            _ => return Err(DecodeError::InvalidToken(token.to_string())),
        };
        info.insert(key, value);
    }
    Ok(info)
}

impl NameInfo {
    fn insert(&mut self, key: &str, value: Option<String>) {
        if let Some(slot) = self.tokens.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.tokens.push((key.to_string(), value));
        }
    }

    /// Whether `key` appeared, as a flag or with a value.
    pub fn contains(&self, key: &str) -> bool {
        self.tokens.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Value of `key` parsed as a local sequential number.
    pub fn number(&self, key: &'static str) -> Result<u64, DecodeError> {
        let value = self.get(key).ok_or(DecodeError::MissingToken(key))?;
        parse_number(key, value)
    }

    /// Local ids listed in the `src` token, joined by `+` for splices.
    pub fn sources(&self) -> Result<Vec<u64>, DecodeError> {
        let src = self.get("src").ok_or(DecodeError::MissingToken("src"))?;
        src.split('+').map(|id| parse_number("src", id)).collect()
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, DecodeError> {
    value.parse::<u64>().map_err(|_| DecodeError::BadNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl fmt::Display for NameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.tokens.iter().enumerate() {
            if i != 0 {
                write!(f, ",")?;
            }
            match value {
                Some(v) => write!(f, "{}:{}", key, v)?,
                None => write!(f, "{}", key)?,
            }
        }
        Ok(())
    }
}
