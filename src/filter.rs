//! Include/exclude filtering of module and function names.

use glob::Pattern;

use crate::error::FilterError;

/// What kind of name is being filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Module,
    Function,
}

/// Decides which modules and functions are compiled.
pub trait NameFilter {
    fn allows(&self, kind: NameKind, name: &str) -> bool;
}

/// Accepts every name.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl NameFilter for AllowAll {
    fn allows(&self, _kind: NameKind, _name: &str) -> bool {
        true
    }
}

/// Shell-style patterns (`*`, `?`, `[...]`) applied to bare names.
///
/// A name passes when it matches some include pattern (or no include
/// patterns were given) and matches no exclude pattern. The same patterns
/// apply to module and function names.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl PatternFilter {
    /// # Errors
    ///
    /// Returns `FilterError::InvalidPattern` for a malformed pattern.
    pub fn new<I, E>(include: I, exclude: E) -> Result<Self, FilterError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Ok(Self {
            include: compile_patterns(include)?,
            exclude: compile_patterns(exclude)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

impl NameFilter for PatternFilter {
    fn allows(&self, _kind: NameKind, name: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| p.matches(name));
        let excluded = self.exclude.iter().any(|p| p.matches(name));
        included && !excluded
    }
}

fn compile_patterns<I>(patterns: I) -> Result<Vec<Pattern>, FilterError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| {
            let p = p.as_ref();
            Pattern::new(p).map_err(|source| FilterError::InvalidPattern {
                pattern: p.to_string(),
                source,
            })
        })
        .collect()
}
