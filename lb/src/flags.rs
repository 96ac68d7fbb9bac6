//! Event flags and the verbosity set that gates them
//!
//! An [`EventFlag`] is an open-ended string identifier. An [`EventFlagSet`]
//! decides which flags are live: either everything except a denylist
//! (`all,-debug`) or nothing except an allowlist (`error,info`).

use std::borrow::{Borrow, Cow};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FlagSetParseError;

/// Identifier for a category of diagnostic event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventFlag(Cow<'static, str>);

impl EventFlag {
    pub const FATAL: EventFlag = EventFlag::from_static("fatal");
    pub const ERROR: EventFlag = EventFlag::from_static("error");
    pub const WARNING: EventFlag = EventFlag::from_static("warning");
    pub const DEBUG: EventFlag = EventFlag::from_static("debug");
    pub const INFO: EventFlag = EventFlag::from_static("info");
    /// Errors caused by user input rather than the program
    pub const USER_ERROR: EventFlag = EventFlag::from_static("error.user");
    pub const WEB_REQUEST_START: EventFlag = EventFlag::from_static("web.request.start");
    pub const WEB_REQUEST: EventFlag = EventFlag::from_static("web.request");
    pub const WEB_REQUEST_BODY: EventFlag = EventFlag::from_static("web.request.body");
    pub const WEB_RESPONSE_BODY: EventFlag = EventFlag::from_static("web.response.body");
    pub const QUEUE_LATENCY: EventFlag = EventFlag::from_static("queue_latency");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EventFlag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EventFlag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for EventFlag {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for EventFlag {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&EventFlag> for EventFlag {
    fn from(flag: &EventFlag) -> Self {
        flag.clone()
    }
}

/// The set of enabled event flags
///
/// `is_enabled(f)` holds iff `f` is not denylisted and either every flag is
/// enabled or `f` was enabled explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFlagSet {
    all_enabled: bool,
    enabled: HashSet<EventFlag>,
    disabled: HashSet<EventFlag>,
}

impl EventFlagSet {
    /// A set with every flag disabled
    pub fn none() -> Self {
        Self::default()
    }

    /// A set with every flag enabled
    pub fn all() -> Self {
        Self {
            all_enabled: true,
            ..Self::default()
        }
    }

    /// A set with exactly the given flags enabled
    pub fn from_flags<I, F>(flags: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<EventFlag>,
    {
        let mut set = Self::none();
        for flag in flags {
            set.enable(flag);
        }
        set
    }

    pub fn enable(&mut self, flag: impl Into<EventFlag>) {
        let flag = flag.into();
        self.disabled.remove(&flag);
        if !self.all_enabled {
            self.enabled.insert(flag);
        }
    }

    pub fn disable(&mut self, flag: impl Into<EventFlag>) {
        let flag = flag.into();
        self.enabled.remove(&flag);
        self.disabled.insert(flag);
    }

    /// Enable every flag and clear per-flag overrides
    pub fn enable_all(&mut self) {
        self.all_enabled = true;
        self.enabled.clear();
        self.disabled.clear();
    }

    /// Disable every flag and clear per-flag overrides
    pub fn disable_all(&mut self) {
        self.all_enabled = false;
        self.enabled.clear();
        self.disabled.clear();
    }

    pub fn is_enabled(&self, flag: impl AsRef<str>) -> bool {
        let flag = flag.as_ref();
        if self.disabled.contains(flag) {
            return false;
        }
        self.all_enabled || self.enabled.contains(flag)
    }

    /// Whether the global mode is "all" (ignores per-flag overrides)
    pub fn is_all_enabled(&self) -> bool {
        self.all_enabled
    }

    /// Whether the global mode is "none" (ignores per-flag overrides)
    pub fn is_none_enabled(&self) -> bool {
        !self.all_enabled
    }
}

impl FromStr for EventFlagSet {
    type Err = FlagSetParseError;

    /// Parse a comma separated list such as `all,-debug` or `error,info,web.request`
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut set = Self::none();
        for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if token.eq_ignore_ascii_case("all") {
                set.enable_all();
            } else if token.eq_ignore_ascii_case("none") {
                set.disable_all();
            } else if let Some(name) = token.strip_prefix('-') {
                let name = name.trim();
                if name.is_empty() {
                    return Err(FlagSetParseError::EmptyFlag {
                        spec: spec.to_string(),
                    });
                }
                set.disable(name.to_string());
            } else {
                set.enable(token.to_string());
            }
        }
        Ok(set)
    }
}

impl fmt::Display for EventFlagSet {
    /// Canonical form: `all` or `none` (omitted when flags are listed), then
    /// enabled flags, then `-`denied flags, each group sorted
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut enabled: Vec<&str> = self.enabled.iter().map(EventFlag::as_str).collect();
        let mut disabled: Vec<&str> = self.disabled.iter().map(EventFlag::as_str).collect();
        enabled.sort_unstable();
        disabled.sort_unstable();

        let mut tokens = Vec::with_capacity(1 + enabled.len() + disabled.len());
        if self.all_enabled {
            tokens.push("all".to_string());
        } else if enabled.is_empty() {
            tokens.push("none".to_string());
        }
        tokens.extend(enabled.into_iter().map(str::to_string));
        tokens.extend(disabled.into_iter().map(|d| format!("-{}", d)));

        f.write_str(&tokens.join(","))
    }
}

impl Serialize for EventFlagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventFlagSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let spec = String::deserialize(deserializer)?;
        spec.parse().map_err(serde::de::Error::custom)
    }
}
