/**
 * Flat hierarchical configuration store.
 *
 * Keys are dot-joined paths (`reporter.outputServer.tls.enable`), values are
 * strings. Typed accessors treat unset and unparsable values the same way:
 * as absent, so the resolver can fall through to the next layer.
 */
use std::collections::BTreeMap;

use serde::Deserialize;

/**
 * Joins a prefix and a key with a dot, tolerating an empty prefix.
 */
pub fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/**
 * Key/value configuration consumed by the sender.
 *
 * Deserializes transparently from a string map, so a JSON object such as
 * `{"reporter.outputServer.enabled": "true"}` is a valid source.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Config {
    entries: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /**
     * Raw value for `key`, if present (possibly empty).
     */
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /**
     * Value for `key` only when it is present and non-empty.
     */
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get_string(key).filter(|value| !value.is_empty())
    }

    /**
     * Parses `true` / `false` case-insensitively. Anything else is `None`.
     */
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let value = self.get_string(key)?.trim();
        if value.eq_ignore_ascii_case("true") {
            Some(true)
        } else if value.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get_string(key)?.trim().parse().ok()
    }

    /**
     * Merges `changes` into the store, overwriting existing keys.
     *
     * Nobody is notified: propagating changes to other listeners is the
     * caller's business.
     */
    pub fn update_configs<I, K, V>(&mut self, changes: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in changes {
            self.set(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Config {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut config = Config::new();
        config.update_configs(iter);
        config
    }
}
