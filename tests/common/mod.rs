// tests/common/mod.rs

//! Shared helpers: synthetic class files and a standard relocator.

#![allow(dead_code)]

use jarmeld::classfile::{ClassBuilder, ClassFile};
use jarmeld::{MergeConfig, PrefixRelocator};

/// Relocator used across the suite: `com/acme` moves to `shaded/acme`.
pub fn relocator() -> PrefixRelocator {
    PrefixRelocator::new().rule("com/acme", "shaded/acme")
}

/// A minimal class with the given internal name.
pub fn simple_class(name: &str) -> Vec<u8> {
    ClassBuilder::new(name).build()
}

/// A class carrying the default exclusion marker.
pub fn excluded_class(name: &str) -> Vec<u8> {
    ClassBuilder::new(name)
        .annotate(&MergeConfig::default().exclude_annotation)
        .build()
}

/// Method names of a serialized class.
pub fn method_names(bytes: &[u8]) -> Vec<String> {
    let class = ClassFile::parse(bytes).expect("output class must parse");
    class
        .methods
        .iter()
        .map(|m| {
            class
                .pool
                .utf8(m.name)
                .expect("method name index")
                .expect("method name utf8")
                .to_string()
        })
        .collect()
}
