//! Response `Vary` bookkeeping.

use std::collections::BTreeSet;

/// Header names the response has to vary on, collected over one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaryRegistry {
    names: BTreeSet<String>,
}

impl VaryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Merge with the response's current `Vary` value.
    ///
    /// Returns `None` when neither side names anything.
    pub fn apply(&self, existing: Option<&str>) -> Option<String> {
        let mut merged: BTreeSet<&str> = existing
            .into_iter()
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        merged.extend(self.names());

        if merged.is_empty() {
            None
        } else {
            Some(merged.into_iter().collect::<Vec<_>>().join(", "))
        }
    }
}
