//! Ordered multi-valued parameters, used for both query strings and headers.

use std::fmt;

/// Ordered multimap of string parameters.
///
/// Values sharing a key keep their insertion order. The same type carries
/// query parameters and headers; header lookups with [`Params::get_ignore_case`]
/// and [`Params::contains_key_ignore_case`] ignore ASCII case.
///
/// # Example
///
/// ```
/// use agentgate_core::Params;
///
/// let mut query = Params::from_flat([("namespace", "default")]);
/// query.append("label", "app=web");
/// query.append("label", "tier=front");
///
/// assert_eq!(query.get_all("label").collect::<Vec<_>>(), ["app=web", "tier=front"]);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    /// Empty parameter set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// One value per key from a flat mapping.
    ///
    /// Accepts anything iterable over pairs: `HashMap`, `BTreeMap`, arrays.
    #[must_use]
    pub fn from_flat<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.append(key, value);
        }
        params
    }

    /// Build parameters from a `Serialize` value.
    ///
    /// Uses `serde_html_form`, so `Vec<T>` fields become repeated keys
    /// (`label=a&label=b`) and `None` fields can be skipped with
    /// `#[serde(skip_serializing_if = "Option::is_none")]`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QuerySerialization`] if the value is not a flat
    /// struct or map.
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> crate::Result<Self> {
        let encoded = crate::to_query_string(value)?;
        Ok(Self {
            entries: url::form_urlencoded::parse(encoded.as_bytes())
                .into_owned()
                .collect(),
        })
    }

    /// Append a value, keeping values already stored under `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    /// Builder-style [`Params::append`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(key, value);
        self
    }

    /// Replace every value stored under `key` with a single one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, value.into()));
        self
    }

    /// Remove every value stored under `key`.
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value for `key`, comparing keys without ASCII case.
    #[must_use]
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if `key` has at least one value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Returns `true` if `key` has at least one value, ignoring ASCII case.
    #[must_use]
    pub fn contains_key_ignore_case(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    /// All entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries (values, not distinct keys).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every entry of `other`.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_flat(iter)
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Params {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.append(key, value);
        }
    }
}

impl IntoIterator for Params {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

type EntryRef<'a> = fn(&'a (String, String)) -> (&'a str, &'a str);

fn entry_ref((key, value): &(String, String)) -> (&str, &str) {
    (key.as_str(), value.as_str())
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a str, &'a str);
    type IntoIter = std::iter::Map<std::slice::Iter<'a, (String, String)>, EntryRef<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter().map(entry_ref as EntryRef<'a>)
    }
}
