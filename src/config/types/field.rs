//! Config field paths for diagnostics.

use owo_colors::OwoColorize;
use std::borrow::Cow;
use std::fmt;

/// Dotted path of a config field, e.g. `build.output` or `rule[2].test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Cow<'static, str>);

impl FieldPath {
    #[inline]
    pub const fn new(path: &'static str) -> Self {
        Self(Cow::Borrowed(path))
    }

    /// Path into an array-of-tables entry: `rule[2].test`.
    pub fn indexed(section: &str, index: usize, field: &str) -> Self {
        Self(Cow::Owned(format!("{section}[{index}].{field}")))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_args!("`{}`", self.0).bright_blue())
    }
}

impl AsRef<str> for FieldPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
