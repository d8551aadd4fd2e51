// src/relocate/mod.rs

//! The relocation oracle seam
//!
//! The merge engine never decides *what* to relocate; it consults a
//! [`Relocator`] for every symbolic name it encounters. Names passed to
//! [`Relocator::relocate`] are slash-qualified (`com/acme/Foo`, resource
//! directories like `com/acme/messages`).
//!
//! Implementations must answer consistently for the duration of one
//! merge: the engine does not validate oracle answers, and an oracle
//! that relocates the same name differently across calls produces an
//! inconsistent artifact.

/// Remapping record for the legacy class-literal caching pattern, where
/// a `Foo.class` expression is compiled into a synthetic static field
/// (`class$com$acme$Foo`) of type `Class` plus a dot-qualified name
/// string handed to the runtime loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLiteralRemapping {
    /// The original literal, dot-qualified (`com.acme.Foo`).
    pub literal: String,
    /// The relocated literal, slash-qualified (`shaded/acme/Foo`).
    pub literal_replacement: String,
    /// The relocated synthetic field name (`class$shaded$acme$Foo`).
    pub field_name_replacement: String,
}

/// Decides which symbols move where.
pub trait Relocator {
    /// Relocate a slash-qualified name. `None` keeps the name as-is.
    fn relocate(&self, name: &str) -> Option<String>;

    /// Remapping for a legacy class-literal cache field, keyed by the
    /// synthetic field name. `None` leaves the field untouched.
    fn remap_class_literal_field(&self, _field_name: &str) -> Option<ClassLiteralRemapping> {
        None
    }

    /// Whether the original (unrelocated) copy of a resource in the
    /// given directory must also be kept. `None` is a root-level
    /// resource. Keeping both copies supports lookup by legacy and
    /// relocated logical paths alike.
    fn keep_original_resource(&self, _directory: Option<&str>) -> bool {
        true
    }
}

/// Rule-table relocator: ordered `from`-prefix to `to`-prefix rules,
/// matched on package-segment boundaries. First matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct PrefixRelocator {
    rules: Vec<(String, String)>,
}

impl PrefixRelocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule mapping the slash-qualified prefix `from` to `to`.
    pub fn rule(mut self, from: &str, to: &str) -> Self {
        self.rules
            .push((from.trim_matches('/').to_string(), to.trim_matches('/').to_string()));
        self
    }
}

impl Relocator for PrefixRelocator {
    fn relocate(&self, name: &str) -> Option<String> {
        for (from, to) in &self.rules {
            if name == from {
                return Some(to.clone());
            }
            // Prefix match only on a segment boundary, so a rule for
            // `com/acme` never captures `com/acmeplus/Thing`.
            if let Some(rest) = name.strip_prefix(from.as_str())
                && rest.starts_with('/')
            {
                return Some(format!("{to}{rest}"));
            }
        }
        None
    }

    fn remap_class_literal_field(&self, field_name: &str) -> Option<ClassLiteralRemapping> {
        let encoded = field_name.strip_prefix("class$")?;
        let literal = encoded.replace('$', ".");
        let replacement = self.relocate(&literal.replace('.', "/"))?;
        Some(ClassLiteralRemapping {
            literal,
            field_name_replacement: format!("class${}", replacement.replace('/', "$")),
            literal_replacement: replacement,
        })
    }
}
