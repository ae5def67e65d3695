use crate::time::Timestamp;
use serde::Serialize;
use std::collections::BTreeMap;

/// LRC metadata from ID tags such as `[ti:Title]` or `[offset:+250]`.
///
/// Tags are kept verbatim; a repeated tag overwrites the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Metadata {
    tags: BTreeMap<String, String>,
}

impl Metadata {
    /// Record a tag, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.get("ti")
    }

    #[must_use]
    pub fn artist(&self) -> Option<&str> {
        self.get("ar")
    }

    #[must_use]
    pub fn album(&self) -> Option<&str> {
        self.get("al")
    }

    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.get("au")
    }

    /// Creator of the LRC file itself.
    #[must_use]
    pub fn lrc_author(&self) -> Option<&str> {
        self.get("by")
    }

    /// Track length from a `[length: mm:ss]` or `[length: mm:ss.xx]` tag.
    #[must_use]
    pub fn length(&self) -> Option<Timestamp> {
        let raw = self.get("length")?.trim();
        raw.parse().ok().or_else(|| {
            // `mm:ss` without a fraction is common here
            format!("{raw}.00").parse().ok()
        })
    }

    /// Signed millisecond offset from an `[offset:]` tag. Unparsable values
    /// are ignored.
    #[must_use]
    pub fn offset(&self) -> Option<i64> {
        let raw = self.get("offset")?.trim();
        raw.strip_prefix('+').unwrap_or(raw).parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_occurrence_wins() {
        let mut meta = Metadata::default();
        meta.insert("ti", "First");
        meta.insert("ti", "Second");
        assert_eq!(meta.title(), Some("Second"));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn test_typed_accessors() {
        let mut meta = Metadata::default();
        meta.insert("ar", "Artist Name");
        meta.insert("al", "Album Name");
        meta.insert("length", "03:25");
        assert_eq!(meta.artist(), Some("Artist Name"));
        assert_eq!(meta.album(), Some("Album Name"));
        assert_eq!(meta.length(), Some(Timestamp::from_millis(205_000)));
    }

    #[test]
    fn test_offset_parsing() {
        let mut meta = Metadata::default();
        meta.insert("offset", "+250");
        assert_eq!(meta.offset(), Some(250));
        meta.insert("offset", "-500");
        assert_eq!(meta.offset(), Some(-500));
        meta.insert("offset", "soon");
        assert_eq!(meta.offset(), None);
    }
}
