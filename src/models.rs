//! Core data models shared by the extraction, normalization and rule stages.
//!
//! The extraction model is an open bag of string values: the key set depends
//! on which lines a log happens to contain, so it is not known in advance.
//! [`crate::normalize::TypedView`] projects the well-known keys into typed fields.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Canonical "enabled" boolean value.
pub const ENABLED_MARK: &str = "[x]";
/// Canonical "disabled" boolean value (non-breaking space inside).
pub const DISABLED_MARK: &str = "[\u{a0}]";

/// An uploaded file as received from the caller.
#[derive(Debug, Clone)]
pub struct RawAttachment {
    pub file_name: String,
    /// Size reported by the upload source; may differ from `bytes.len()`.
    pub declared_size: u64,
    pub bytes: Arc<[u8]>,
}

impl RawAttachment {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            file_name: file_name.into(),
            declared_size: bytes.len() as u64,
            bytes,
        }
    }

    /// Leading bytes used for format detection.
    pub fn header(&self, len: usize) -> &[u8] {
        &self.bytes[..self.bytes.len().min(len)]
    }
}

/// How extraction ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseOutcome {
    #[default]
    Success,
    SizeLimitReached,
    UnknownError,
    /// Not an error: a moderation hand-off carrying the triggering filter
    /// string and the log line it was found in.
    PiracyDetected { trigger: String, context: String },
}

impl ParseOutcome {
    pub fn is_piracy(&self) -> bool {
        matches!(self, ParseOutcome::PiracyDetected { .. })
    }
}

/// Insertion-ordered list of unique strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UniqueList(Vec<String>);

impl UniqueList {
    /// Appends `value` unless an identical entry exists. Returns whether it was added.
    pub fn push(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.0.contains(&value) {
            return false;
        }
        self.0.push(value);
        true
    }

    pub fn extend<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.push(value);
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for UniqueList {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut list = UniqueList::default();
        list.extend(iter);
        list
    }
}

/// Structured values extracted from one log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionModel {
    /// Key to last-seen value.
    pub single: BTreeMap<String, String>,
    /// Key to ordered unique values.
    pub multi: BTreeMap<String, UniqueList>,
    /// Occurrence counters for keys whose frequency matters.
    pub hit_stats: BTreeMap<String, u64>,
    /// Serial to syscall names seen while that title ran.
    pub syscalls: BTreeMap<String, BTreeSet<String>>,
    pub outcome: ParseOutcome,
    pub read_bytes: u64,
    pub total_bytes: u64,
}

impl ExtractionModel {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.single.get(key).map(String::as_str)
    }

    /// Like [`get`](Self::get) but treats empty values as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.single.insert(key.into(), value.into());
    }

    pub fn multi(&self, key: &str) -> &[String] {
        self.multi.get(key).map(UniqueList::as_slice).unwrap_or(&[])
    }

    pub fn push_multi(&mut self, key: &str, value: impl Into<String>) {
        self.multi.entry(key.to_string()).or_default().push(value);
    }

    pub fn hits(&self, key: &str) -> u64 {
        self.hit_stats.get(key).copied().unwrap_or(0)
    }

    /// True when nothing at all was extracted.
    pub fn is_empty(&self) -> bool {
        self.single.is_empty() && self.multi.values().all(UniqueList::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_list_keeps_first_insertion_order() {
        let mut list = UniqueList::default();
        assert!(list.push("b"));
        assert!(list.push("a"));
        assert!(!list.push("b"));
        assert_eq!(list.as_slice(), ["b", "a"]);
    }

    #[test]
    fn single_values_overwrite() {
        let mut model = ExtractionModel::default();
        model.set("renderer", "OpenGL");
        model.set("renderer", "Vulkan");
        assert_eq!(model.get("renderer"), Some("Vulkan"));
        assert!(model.multi("fatal_error").is_empty());
    }

    #[test]
    fn piracy_outcome_serializes_with_payload() {
        let outcome = ParseOutcome::PiracyDetected {
            trigger: "bad".into(),
            context: "line with bad".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "piracy_detected");
        assert_eq!(json["trigger"], "bad");
    }
}
