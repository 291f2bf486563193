use std::fmt;

/// Identifies one managed collection in the cache, e.g. `projects` or `services/public`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionKey(Vec<String>);

impl CollectionKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Key of the admin list for a table.
    pub fn of(table: &str) -> Self {
        Self(vec![table.to_string()])
    }

    pub fn child(&self, part: impl Into<String>) -> Self {
        let mut parts = self.0.clone();
        parts.push(part.into());
        Self(parts)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// First segment, by convention the table name.
    pub fn root(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn starts_with(&self, prefix: &CollectionKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl From<&str> for CollectionKey {
    fn from(table: &str) -> Self {
        Self::of(table)
    }
}
