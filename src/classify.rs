//! Submit-line classification: does this look like an interactive allocation?

/// Substring matcher over the literal submit line.
///
/// Matching is case-sensitive containment, not tokenized parsing: `salloc`
/// anywhere in the line (including inside a path or argument) counts.
#[derive(Debug, Clone)]
pub struct Classifier {
    indicators: Vec<String>,
}

impl Classifier {
    /// Build a classifier from configured indicators. Empty strings are dropped,
    /// otherwise they would mark every submission as restricted.
    pub fn new<I, S>(indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let indicators = indicators
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect();
        Self { indicators }
    }

    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    /// A missing or empty submit line is not restricted.
    pub fn is_restricted(&self, submit_line: Option<&str>) -> bool {
        let Some(line) = submit_line else {
            return false;
        };
        self.matched_indicator(line).is_some()
    }

    /// The first indicator found in `line`, if any.
    pub fn matched_indicator(&self, line: &str) -> Option<&str> {
        self.indicators
            .iter()
            .find(|ind| line.contains(ind.as_str()))
            .map(String::as_str)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(["salloc", "ondemand/data/sys/dashboard"])
    }
}
