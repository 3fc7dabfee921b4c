//! Launch parameters handed to the host at process start.
//!
//! Extras are typed like Android intent extras: strings, booleans and
//! integers keyed by name. Hosts build them from their own command line or
//! from the process environment for a fixed set of keys.

use std::collections::HashMap;

pub const API_KEY_EXTRA: &str = "API_KEY";
pub const AUTO_RUN_EXTRA: &str = "AUTO_RUN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraValue {
    String(String),
    Bool(bool),
    Int(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    extras: HashMap<String, ExtraValue>,
}

impl LaunchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras
            .insert(key.into(), ExtraValue::String(value.into()));
        self
    }

    pub fn with_bool(mut self, key: impl Into<String>, value: bool) -> Self {
        self.extras.insert(key.into(), ExtraValue::Bool(value));
        self
    }

    pub fn with_int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.extras.insert(key.into(), ExtraValue::Int(value));
        self
    }

    /// Read `API_KEY` (string) and `AUTO_RUN` (boolean) from environment variables
    pub fn from_env() -> Self {
        let mut params = Self::new();
        if let Ok(key) = std::env::var(API_KEY_EXTRA) {
            params = params.with_string(API_KEY_EXTRA, key);
        }
        if let Some(b) = std::env::var(AUTO_RUN_EXTRA).ok().and_then(|v| parse_bool(&v)) {
            params = params.with_bool(AUTO_RUN_EXTRA, b);
        }
        params
    }

    /// Overlay `other` onto `self`; keys in `other` win
    pub fn merge(mut self, other: LaunchParams) -> Self {
        self.extras.extend(other.extras);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ExtraValue> {
        self.extras.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.extras.get(key) {
            Some(ExtraValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.extras.get(key) {
            Some(ExtraValue::Bool(b)) => *b,
            _ => default,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.extras.is_empty()
    }
}

/// Boolean spellings accepted for extras
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Startup values the page receives. Read once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupParams {
    pub api_key: Option<String>,
    pub auto_run: bool,
}

impl StartupParams {
    pub fn from_launch(params: &LaunchParams) -> Self {
        let api_key = params
            .get_string(API_KEY_EXTRA)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        Self {
            api_key,
            auto_run: params.get_bool(AUTO_RUN_EXTRA, false),
        }
    }

    pub fn api_key_present(&self) -> bool {
        self.api_key.is_some()
    }
}
