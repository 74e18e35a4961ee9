//! Topic identification and storage key derivation.
//!
//! A [`Topic`] names one independent event stream, e.g. `"line:U123"` or
//! `"dtinth/kio:<eventId>"`. Topics are built by callers from identifiers that
//! arrive in requests (reference codes, phone numbers, channel names), so they
//! are never used as storage keys directly. [`StorageKeyPolicy`] turns a topic
//! into a namespaced, percent-encoded, length-capped key.
//!
//! # Key format
//!
//! ```text
//! {namespace}:{encodeURIComponent(topic)[..100]}
//! ```
//!
//! Truncation is applied after encoding, so two topics whose encoded forms
//! share the first 100 characters map to the same key and share a stream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default namespace prepended to every storage key.
pub const DEFAULT_NAMESPACE: &str = "mockapis:events";

/// Default cap on the encoded topic portion of a storage key.
pub const DEFAULT_MAX_TOPIC_LENGTH: usize = 100;

/// Escapes produced by `urlencoding` for marks that `encodeURIComponent` keeps.
const UNRESERVED_MARKS: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Identifier for an independent, ordered event stream.
///
/// The core treats the topic as an opaque string; it is derived by each caller
/// from domain identifiers (typically `{service}:{entity-id}`).
///
/// # Examples
///
/// ```
/// use mockapis_core::topic::Topic;
///
/// let topic = Topic::new("line:U123");
/// assert_eq!(topic.as_str(), "line:U123");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    /// Create a new `Topic` from a string.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self(topic.into())
    }

    /// Build a `{service}:{entity}` topic.
    ///
    /// ```
    /// use mockapis_core::topic::Topic;
    ///
    /// let topic = Topic::scoped("dtinth/kio", "evt-1");
    /// assert_eq!(topic.as_str(), "dtinth/kio:evt-1");
    /// ```
    #[must_use]
    pub fn scoped(service: &str, entity: impl fmt::Display) -> Self {
        Self(format!("{service}:{entity}"))
    }

    /// Get the topic as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `Topic` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Percent-encode a string the way ECMAScript `encodeURIComponent` does.
///
/// `A-Z a-z 0-9 - _ . ! ~ * ' ( )` pass through; every other byte of the UTF-8
/// encoding becomes `%XX` with upper-case hex digits.
///
/// ```
/// use mockapis_core::topic::encode_uri_component;
///
/// assert_eq!(encode_uri_component("dtinth/kio:a b"), "dtinth%2Fkio%3Aa%20b");
/// assert_eq!(encode_uri_component("it's(ok)!*~"), "it's(ok)!*~");
/// ```
#[must_use]
pub fn encode_uri_component(raw: &str) -> String {
    let encoded = urlencoding::encode(raw).into_owned();
    if !encoded.contains('%') {
        return encoded;
    }
    // Every '%' in the output starts an escape, so plain replacement is exact.
    UNRESERVED_MARKS
        .iter()
        .fold(encoded, |acc, (escape, mark)| acc.replace(escape, mark))
}

/// Derives storage keys from topics.
///
/// # Examples
///
/// ```
/// use mockapis_core::topic::{StorageKeyPolicy, Topic};
///
/// let policy = StorageKeyPolicy::default();
/// assert_eq!(
///     policy.key_for(&Topic::new("line:U123")),
///     "mockapis:events:line%3AU123"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKeyPolicy {
    namespace: String,
    max_topic_length: usize,
}

impl StorageKeyPolicy {
    /// Create a policy with the given namespace and encoded-topic cap.
    #[must_use]
    pub fn new(namespace: impl Into<String>, max_topic_length: usize) -> Self {
        Self {
            namespace: namespace.into(),
            max_topic_length,
        }
    }

    /// The namespace prepended to every key.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Maximum length of the encoded topic portion of a key.
    #[must_use]
    pub const fn max_topic_length(&self) -> usize {
        self.max_topic_length
    }

    /// Encode and truncate a topic without the namespace.
    ///
    /// The encoded form is pure ASCII, so truncating by characters is the same
    /// as truncating by bytes. A trailing escape may be cut in half.
    #[must_use]
    pub fn sanitize(&self, topic: &Topic) -> String {
        let mut encoded = encode_uri_component(topic.as_str());
        encoded.truncate(self.max_topic_length.min(encoded.len()));
        encoded
    }

    /// Full storage key for a topic: `{namespace}:{sanitized-topic}`.
    #[must_use]
    pub fn key_for(&self, topic: &Topic) -> String {
        format!("{}:{}", self.namespace, self.sanitize(topic))
    }
}

impl Default for StorageKeyPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE, DEFAULT_MAX_TOPIC_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod topic_tests {
        use super::*;

        #[test]
        fn scoped_joins_with_colon() {
            let topic = Topic::scoped("smskub", "0812345678");
            assert_eq!(topic.as_str(), "smskub:0812345678");
        }

        #[test]
        fn from_and_display() {
            let topic = Topic::from("slack:C01");
            assert_eq!(format!("{topic}"), "slack:C01");
            assert_eq!(Topic::from("slack:C01".to_string()), topic);
            assert_eq!(topic.into_inner(), "slack:C01");
        }
    }

    mod encoding_tests {
        use super::*;

        #[test]
        fn leaves_unreserved_characters() {
            let raw = "ABCxyz019-_.!~*'()";
            assert_eq!(encode_uri_component(raw), raw);
        }

        #[test]
        fn escapes_reserved_characters() {
            assert_eq!(encode_uri_component(":/?#[]@"), "%3A%2F%3F%23%5B%5D%40");
            assert_eq!(encode_uri_component("$&+,;= "), "%24%26%2B%2C%3B%3D%20");
            assert_eq!(encode_uri_component("%"), "%25");
        }

        #[test]
        fn escapes_utf8_bytes() {
            assert_eq!(encode_uri_component("é"), "%C3%A9");
            assert_eq!(encode_uri_component("กข"), "%E0%B8%81%E0%B8%82");
        }

        #[test]
        fn escaped_percent_does_not_become_a_mark() {
            // "%21" literally must stay escaped, not turn into "!"
            assert_eq!(encode_uri_component("%21"), "%2521");
        }
    }

    mod key_tests {
        use super::*;

        #[test]
        fn default_key_format() {
            let policy = StorageKeyPolicy::default();
            assert_eq!(
                policy.key_for(&Topic::new("dtinth/kio:evt 1")),
                "mockapis:events:dtinth%2Fkio%3Aevt%201"
            );
        }

        #[test]
        fn truncates_after_encoding() {
            let policy = StorageKeyPolicy::default();
            let topic = Topic::new("a".repeat(150));
            assert_eq!(policy.sanitize(&topic).len(), 100);
        }

        #[test]
        fn truncation_can_split_an_escape() {
            let policy = StorageKeyPolicy::default();
            // 99 plain characters, then ':' encodes to "%3A" and is cut to "%"
            let topic = Topic::new(format!("{}:tail", "x".repeat(99)));
            let sanitized = policy.sanitize(&topic);
            assert_eq!(sanitized.len(), 100);
            assert!(sanitized.ends_with('%'));
        }

        #[test]
        fn distinct_topics_with_shared_prefix_collide() {
            let policy = StorageKeyPolicy::default();
            let prefix = "p".repeat(100);
            let a = Topic::new(format!("{prefix}:first"));
            let b = Topic::new(format!("{prefix}/second"));
            assert_ne!(a, b);
            assert_eq!(policy.key_for(&a), policy.key_for(&b));
        }

        #[test]
        fn custom_namespace() {
            let policy = StorageKeyPolicy::new("test:ns", 10);
            assert_eq!(policy.namespace(), "test:ns");
            assert_eq!(policy.max_topic_length(), 10);
            assert_eq!(policy.key_for(&Topic::new("abcdefghijkl")), "test:ns:abcdefghij");
        }
    }

    proptest! {
        #[test]
        fn sanitized_topic_is_bounded_ascii(raw in ".*") {
            let policy = StorageKeyPolicy::default();
            let sanitized = policy.sanitize(&Topic::new(raw));
            prop_assert!(sanitized.len() <= DEFAULT_MAX_TOPIC_LENGTH);
            prop_assert!(sanitized.is_ascii());
        }

        #[test]
        fn key_depends_only_on_encoded_prefix(raw in "[a-z:/ ]{40,80}", tail_a in ".{0,20}", tail_b in ".{0,20}") {
            let policy = StorageKeyPolicy::default();
            // Every character of `raw` encodes to at most 3 bytes; 80 * 3 > 100,
            // so pad to guarantee the prefix alone fills the cap.
            let padded = format!("{raw}{}", "z".repeat(100));
            let a = Topic::new(format!("{padded}{tail_a}"));
            let b = Topic::new(format!("{padded}{tail_b}"));
            prop_assert_eq!(policy.key_for(&a), policy.key_for(&b));
        }

        #[test]
        fn unreserved_topics_are_unchanged(raw in "[A-Za-z0-9_.!~*'()-]{0,100}") {
            prop_assert_eq!(encode_uri_component(&raw), raw);
        }
    }
}
