// src/shade/tombstone.rs

//! Removed-method filtering
//!
//! Methods carrying the removal marker are physically deleted from the
//! module before relocation, so deleted bodies never need rewriting.
//! Deletion is exact `(name, descriptor)` match: overloads with a
//! different descriptor survive.

use std::collections::HashSet;

use tracing::debug;

use crate::classfile::annotations;
use crate::classfile::parser::ClassFile;
use crate::error::Result;
use crate::shade::MergeConfig;

/// Byte-level contract: parse, strip, re-serialize.
pub fn filter_removed_methods(config: &MergeConfig, bytes: &[u8]) -> Result<Vec<u8>> {
    let mut class = ClassFile::parse(bytes)?;
    strip(config, &mut class)?;
    Ok(class.to_bytes())
}

/// Strip marked methods from a parsed class.
pub(crate) fn strip(config: &MergeConfig, class: &mut ClassFile) -> Result<()> {
    // Pass 1: collect the signatures of marked methods.
    let mut removed: HashSet<(String, String)> = HashSet::new();
    for method in &class.methods {
        if annotations::has_annotation(&class.pool, &method.attributes, &config.removed_annotation)?
        {
            let name = class.pool.utf8(method.name)?;
            let descriptor = class.pool.utf8(method.descriptor)?;
            if let (Some(name), Some(descriptor)) = (name, descriptor) {
                removed.insert((name.to_string(), descriptor.to_string()));
            }
        }
    }
    if removed.is_empty() {
        return Ok(());
    }

    // Pass 2: keep everything whose exact signature is not marked.
    let methods = std::mem::take(&mut class.methods);
    for method in methods {
        let name = class.pool.utf8(method.name)?.unwrap_or_default();
        let descriptor = class.pool.utf8(method.descriptor)?.unwrap_or_default();
        if removed.contains(&(name.to_string(), descriptor.to_string())) {
            debug!(method = %name, descriptor = %descriptor, "dropping removed method");
        } else {
            class.methods.push(method);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::ClassBuilder;

    fn config() -> MergeConfig {
        MergeConfig::default()
    }

    fn method_signatures(bytes: &[u8]) -> Vec<(String, String)> {
        let class = ClassFile::parse(bytes).unwrap();
        class
            .methods
            .iter()
            .map(|m| {
                (
                    class.pool.utf8(m.name).unwrap().unwrap().to_string(),
                    class.pool.utf8(m.descriptor).unwrap().unwrap().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn deletes_marked_methods() {
        let cfg = config();
        let bytes = ClassBuilder::new("com/acme/Foo")
            .annotated_method("legacy", "()V", &cfg.removed_annotation)
            .method("keep", "()V")
            .build();
        let filtered = filter_removed_methods(&cfg, &bytes).unwrap();
        assert_eq!(
            method_signatures(&filtered),
            [("keep".to_string(), "()V".to_string())]
        );
    }

    #[test]
    fn overloads_with_a_different_descriptor_survive() {
        let cfg = config();
        let bytes = ClassBuilder::new("com/acme/Foo")
            .annotated_method("value", "()V", &cfg.removed_annotation)
            .method("value", "(I)V")
            .build();
        let filtered = filter_removed_methods(&cfg, &bytes).unwrap();
        assert_eq!(
            method_signatures(&filtered),
            [("value".to_string(), "(I)V".to_string())],
            "only the exact signature may be deleted"
        );
    }

    #[test]
    fn unmarked_classes_pass_through_structurally_unchanged() {
        let cfg = config();
        let bytes = ClassBuilder::new("com/acme/Foo").method("keep", "()V").build();
        let filtered = filter_removed_methods(&cfg, &bytes).unwrap();
        assert_eq!(filtered, bytes);
    }
}
