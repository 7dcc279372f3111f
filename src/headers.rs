//! Ordered `Key: Value` records as carried by AMI messages.

use serde::{Deserialize, Serialize};

/// Ordered list of AMI key/value pairs.
///
/// AMI keys are matched case-insensitively and may repeat (`Output`,
/// `ChanVariable`, `Variable`), so this keeps every pair in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmiHeaders(Vec<(String, String)>);

impl AmiHeaders {
    /// Empty header list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// First value for `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in wire order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name)
            .is_some()
    }

    /// Replace every value for `name` with a single one, keeping the position
    /// of the first occurrence.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .0
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(pos) => {
                self.0[pos].1 = value;
                let mut index = 0;
                self.0
                    .retain(|(k, _)| {
                        let keep = index <= pos || !k.eq_ignore_ascii_case(&name);
                        index += 1;
                        keep
                    });
            }
            None => self
                .0
                .push((name, value)),
        }
    }

    /// Append a pair, keeping existing values for the same key.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0
            .push((name.into(), value.into()));
    }

    /// Remove every value for `name`, returning the first one.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let first = self
            .get(name)
            .map(str::to_string);
        self.0
            .retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        first
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.0
            .is_empty()
    }
}

impl FromIterator<(String, String)> for AmiHeaders {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .collect(),
        )
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for AmiHeaders {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}
