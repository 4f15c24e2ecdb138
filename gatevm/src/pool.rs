//! The four constant pools owned by a [`crate::program::Program`]: integers,
//! strings, regular-expression patterns, and module-import descriptors.
//! Immutable after construction; indices into them are stable for the
//! Program's lifetime.

use crate::error::LinkError;
use regex::Regex;

/// Ordered, immutable sequence of signed 64-bit integer literals.
#[derive(Debug, Clone, Default)]
pub struct IntegerPool(Vec<i64>);

impl IntegerPool {
    pub fn new(values: Vec<i64>) -> Self {
        IntegerPool(values)
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        self.0.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered, immutable sequence of byte strings. Addresses (indices) are
/// stable for the Program's lifetime: bytecode holds string values by index
/// via `SCONST`.
#[derive(Debug, Clone, Default)]
pub struct StringPool(Vec<String>);

impl StringPool {
    pub fn new(values: Vec<String>) -> Self {
        StringPool(values)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered sequence of regular-expression source patterns, pre-compiled on
/// [`crate::program::Program::link`].
#[derive(Debug, Default)]
pub struct RegexPool {
    patterns: Vec<String>,
    compiled: Vec<Option<Regex>>,
}

impl RegexPool {
    pub fn new(patterns: Vec<String>) -> Self {
        let compiled = patterns.iter().map(|_| None).collect();
        RegexPool { patterns, compiled }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn pattern(&self, index: usize) -> Option<&str> {
        self.patterns.get(index).map(String::as_str)
    }

    pub fn compiled(&self, index: usize) -> Option<&Regex> {
        self.compiled.get(index).and_then(|slot| slot.as_ref())
    }

    /// Compile every pattern, recording a [`LinkError::RegexCompilationError`]
    /// for each one that fails. Idempotent: re-running replaces prior
    /// compiled entries.
    pub fn compile_all(&mut self) -> Vec<LinkError> {
        let mut errors = Vec::new();
        for (index, pattern) in self.patterns.iter().enumerate() {
            match Regex::new(pattern) {
                Ok(re) => self.compiled[index] = Some(re),
                Err(e) => {
                    self.compiled[index] = None;
                    errors.push(LinkError::RegexCompilationError {
                        index,
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        errors
    }
}

/// A `(name, path)` module-import descriptor; `path` may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleImport {
    pub name: String,
    pub path: String,
}

/// Ordered sequence of module imports, resolved against a
/// [`crate::runtime::Runtime`] during linking.
#[derive(Debug, Clone, Default)]
pub struct ModulePool(Vec<ModuleImport>);

impl ModulePool {
    pub fn new(modules: Vec<ModuleImport>) -> Self {
        ModulePool(modules)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleImport> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_indices_are_stable_after_construction() {
        let pool = StringPool::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(pool.get(0), Some("a"));
        assert_eq!(pool.get(2), Some("c"));
        assert_eq!(pool.get(3), None);
    }

    #[test]
    fn regex_pool_reports_one_error_per_bad_pattern() {
        let mut pool = RegexPool::new(vec!["[a-z]+".into(), "(unterminated".into()]);
        let errors = pool.compile_all();
        assert_eq!(errors.len(), 1);
        assert!(pool.compiled(0).is_some());
        assert!(pool.compiled(1).is_none());
    }
}
