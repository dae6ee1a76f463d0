//! Metric tags.

use std::fmt;

/// A metric tag.
///
/// Tags are either bare (`production`) or key/value-style (`service:web`), with the key and value
/// separated by the first colon.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Tag(String);

impl Tag {
    /// Returns `true` if the tag is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a reference to the entire underlying tag string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Gets the name of the tag.
    ///
    /// For bare tags, this is the tag value itself. For key/value-style tags, this is the key part
    /// of the tag.
    pub fn name(&self) -> &str {
        match self.0.split_once(':') {
            Some((name, _)) => name,
            None => &self.0,
        }
    }

    /// Gets the value of the tag.
    ///
    /// For bare tags, this always returns `None`. For key/value-style tags, this is the value part
    /// of the tag.
    pub fn value(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, value)| value)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Tag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A set of tags.
///
/// Insertion order is preserved, but equal membership is what determines series identity: two tag
/// sets holding the same tags in any order canonicalize to the same tag key.
#[derive(Clone, Debug, Default)]
pub struct TagSet(Vec<Tag>);

impl TagSet {
    /// Creates a new, empty tag set with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Returns `true` if the tag set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of tags in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Inserts a tag into the set.
    ///
    /// If the tag is already present in the set, this does nothing.
    pub fn insert_tag<T>(&mut self, tag: T)
    where
        T: Into<Tag>,
    {
        let tag = tag.into();
        if !self.0.iter().any(|existing| existing == &tag) {
            self.0.push(tag);
        }
    }

    /// Returns `true` if the given tag is contained in the set.
    ///
    /// This matches the complete tag, rather than just the name.
    pub fn has_tag<T>(&self, tag: T) -> bool
    where
        T: AsRef<str>,
    {
        let tag = tag.as_ref();
        self.0.iter().any(|existing| existing.as_str() == tag)
    }

    /// Returns an iterator over the tags in the set.
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    /// Derives the canonical tag key for this set.
    ///
    /// The key is the comma-joined, lexicographically sorted rendering of the tags, so sets with
    /// equal membership always produce equal keys. The empty set produces the empty key.
    pub fn to_tags_key(&self) -> String {
        let mut tags = self.0.iter().map(Tag::as_str).collect::<Vec<_>>();
        tags.sort_unstable();
        tags.join(",")
    }
}

impl PartialEq for TagSet {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }

        other.0.iter().all(|tag| self.0.contains(tag))
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, tag) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", tag)?;
        }
        Ok(())
    }
}

impl<T> FromIterator<T> for TagSet
where
    T: Into<Tag>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tags = Self::default();
        for tag in iter {
            tags.insert_tag(tag);
        }
        tags
    }
}

impl IntoIterator for TagSet {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use proptest::collection::vec as arb_vec;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn tag_name_and_value() {
        let bare = Tag::from("production");
        assert_eq!(bare.name(), "production");
        assert_eq!(bare.value(), None);

        let keyed = Tag::from("service:web");
        assert_eq!(keyed.name(), "service");
        assert_eq!(keyed.value(), Some("web"));

        // Only the first colon separates the key from the value.
        let nested = Tag::from("path:/a:b");
        assert_eq!(nested.name(), "path");
        assert_eq!(nested.value(), Some("/a:b"));
    }

    #[test]
    fn insert_deduplicates() {
        let mut tags = TagSet::default();
        tags.insert_tag("env:prod");
        tags.insert_tag("env:prod");
        tags.insert_tag("service:web");

        assert_eq!(tags.len(), 2);
        assert!(tags.has_tag("env:prod"));
        assert!(tags.has_tag("service:web"));
    }

    #[test]
    fn tags_key_is_sorted_and_joined() {
        let tags: TagSet = ["service:web", "env:prod"].into_iter().collect();
        assert_eq!(tags.to_tags_key(), "env:prod,service:web");

        assert_eq!(TagSet::default().to_tags_key(), "");
    }

    proptest! {
        #[test]
        fn tags_key_is_order_invariant(raw_tags in arb_vec("[a-z]{1,8}(:[a-z0-9]{1,8})?", 0..8)) {
            let forwards: TagSet = raw_tags.iter().map(String::as_str).collect();
            let backwards: TagSet = raw_tags.iter().rev().map(String::as_str).collect();

            prop_assert_eq!(forwards.to_tags_key(), backwards.to_tags_key());
            prop_assert_eq!(forwards, backwards);
        }
    }
}
