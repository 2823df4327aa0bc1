use std::collections::BTreeMap;

use bincode::{Decode, Encode};

/// Categorized messages shown to the user exactly once.
///
/// Categories are free-form, but templates style `success`, `info`,
/// `warning` and `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct Flash(BTreeMap<String, Vec<String>>);

impl Flash {
    /// Appends `message` under `category`.
    pub fn add(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.0.entry(category.into()).or_default().push(message.into());
    }

    /// Returns every pending message and leaves the container empty.
    pub fn take(&mut self) -> BTreeMap<String, Vec<String>> {
        std::mem::take(&mut self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, category: &str) -> Option<&[String]> {
        self.0.get(category).map(Vec::as_slice)
    }
}
