// src/shade/resources.rs

//! Resource relocation
//!
//! A resource may be written under its original path, its relocated
//! path, both, or neither. Writing both copies supports lookup through
//! legacy and relocated logical paths alike.

use crate::relocate::Relocator;

/// Output paths for a resource entry, in write order.
pub fn relocated_paths(relocator: &dyn Relocator, name: &str) -> Vec<String> {
    let mut paths = Vec::with_capacity(2);
    let split = name.rfind('/');
    let directory = split.map(|i| &name[..i]);

    if relocator.keep_original_resource(directory) {
        paths.push(name.to_string());
    }
    if let Some(i) = split
        && let Some(relocated) = relocator.relocate(&name[..i])
    {
        // `&name[i..]` keeps the slash and the file name.
        paths.push(format!("{relocated}{}", &name[i..]));
    }
    paths
}
