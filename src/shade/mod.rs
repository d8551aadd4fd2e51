// src/shade/mod.rs

//! The merge-and-relocate engine
//!
//! Submodules mirror the processing stages: `tombstone` (removed-method
//! filter), `remap` (symbol relocation), `exclusion` (package exclusion
//! propagation), `services` (provider registry merging), `resources`
//! (dual-path resource relocation) and `pipeline` (the driver that wires
//! them to the input archives and the output sink).

pub mod exclusion;
pub mod pipeline;
pub mod remap;
pub mod resources;
pub mod services;
pub mod tombstone;

pub use pipeline::JarMerger;
pub use remap::RemappingResult;

/// Prefix under which provider-configuration descriptors live.
pub const SERVICES_PREFIX: &str = "META-INF/services/";

/// Suffix of compiled module entries.
pub const CLASS_SUFFIX: &str = ".class";

/// Descriptor of the runtime type-object class; fields of this type are
/// candidates for the legacy class-literal remapping.
pub const CLASS_DESC: &str = "Ljava/lang/Class;";

/// Merge behavior knobs. The marker annotations belong to the codebase
/// being merged, not to the tool, so they are configuration with
/// defaults rather than hard-wired constants.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Type descriptor of the class-level marker that excludes a module
    /// (and, on a package metadata unit, its whole package) from the
    /// output.
    pub exclude_annotation: String,
    /// Type descriptor of the method-level marker that deletes a method
    /// from the merged module.
    pub removed_annotation: String,
    /// Path of the zero-length file identifying the output as a
    /// generated merge artifact.
    pub marker_path: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            exclude_annotation: "Ljarmeld/api/Internal;".to_string(),
            removed_annotation: "Ljarmeld/api/Removed;".to_string(),
            marker_path: "META-INF/.jarmeld-merged".to_string(),
        }
    }
}
