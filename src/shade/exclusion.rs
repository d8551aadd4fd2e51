// src/shade/exclusion.rs

//! Package exclusion propagation
//!
//! When a package's metadata unit (`.../package-info`) carries the
//! exclusion marker, the whole package is excluded: every later class in
//! that package or a descendant package is dropped. The set only grows
//! during a run; exclusions are never revoked.

use std::collections::HashSet;

/// Append-only set of excluded package paths (slash-qualified).
#[derive(Debug, Default)]
pub struct ExcludedPackages {
    packages: HashSet<String>,
}

impl ExcludedPackages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a package as excluded.
    pub fn exclude(&mut self, package: impl Into<String>) {
        self.packages.insert(package.into());
    }

    /// A package is excluded if it or any ancestor is in the set. The
    /// root package is never excluded by ancestry. Iterative walk up the
    /// path; the original recursed, but deep namespaces make that a
    /// stack hazard.
    pub fn is_excluded(&self, package: &str) -> bool {
        if self.packages.is_empty() {
            return false;
        }
        let mut current = package;
        loop {
            if self.packages.contains(current) {
                return true;
            }
            if current.is_empty() {
                return false;
            }
            current = parent_package(current);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// The enclosing package of a slash-qualified name; `""` at the root.
pub fn parent_package(name: &str) -> &str {
    match name.rfind('/') {
        Some(i) => &name[..i],
        None => "",
    }
}
