// src/shade/pipeline.rs

//! The merge driver
//!
//! Consumes input archives in caller order, classifies and dedupes
//! entries, dispatches to the class/service/resource paths, and finally
//! writes the merged provider registries plus the identifying marker
//! file. All run state lives in a `MergeContext` created per invocation;
//! nothing persists across merges.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::archive::{ArchiveEntry, EntrySource, OutputSink};
use crate::classfile::parser::ClassFile;
use crate::error::{Error, Result};
use crate::progress::{ProgressTracker, SilentProgress};
use crate::relocate::Relocator;
use crate::shade::exclusion::{self, ExcludedPackages};
use crate::shade::services::ServiceRegistry;
use crate::shade::{CLASS_SUFFIX, MergeConfig, SERVICES_PREFIX, remap, resources, tombstone};

/// Registry and marker emission, on top of the per-archive entries.
const ADDITIONAL_PROGRESS_STEPS: u64 = 2;

/// Per-invocation accumulator state, passed by exclusive reference into
/// every per-entry step.
#[derive(Default)]
struct MergeContext {
    seen_paths: HashSet<String>,
    excluded: ExcludedPackages,
    services: ServiceRegistry,
}

/// Merges input archives into one shaded output archive.
pub struct JarMerger<R: Relocator> {
    relocator: R,
    config: MergeConfig,
}

impl<R: Relocator> JarMerger<R> {
    pub fn new(relocator: R) -> Self {
        Self::with_config(relocator, MergeConfig::default())
    }

    pub fn with_config(relocator: R, config: MergeConfig) -> Self {
        Self { relocator, config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge `inputs`, in order, into `output`. Fatal on the first I/O
    /// or class-parse error; on failure the output must be considered
    /// invalid and discarded by the caller.
    pub fn merge(&self, output: &mut dyn OutputSink, inputs: &[&dyn EntrySource]) -> Result<()> {
        self.merge_with_progress(output, inputs, &SilentProgress::new())
    }

    /// As [`merge`](Self::merge), reporting one progress unit per input
    /// archive plus two trailing steps (registries, marker file).
    pub fn merge_with_progress(
        &self,
        output: &mut dyn OutputSink,
        inputs: &[&dyn EntrySource],
        progress: &dyn ProgressTracker,
    ) -> Result<()> {
        info!(archives = inputs.len(), "merging input archives");
        progress.set_length(inputs.len() as u64 + ADDITIONAL_PROGRESS_STEPS);

        let mut ctx = MergeContext::default();
        for (i, source) in inputs.iter().enumerate() {
            progress.set_message(&format!("archive {}/{}", i + 1, inputs.len()));
            for entry in source.entries()? {
                self.process_entry(&mut ctx, output, entry)?;
            }
            progress.increment(1);
        }

        self.write_service_files(&ctx, output)?;
        progress.increment(1);

        output.put(&self.config.marker_path, &[])?;
        progress.increment(1);

        progress.finish_with_message("merge complete");
        info!(services = ctx.services.len(), "merge complete");
        Ok(())
    }

    fn process_entry(
        &self,
        ctx: &mut MergeContext,
        output: &mut dyn OutputSink,
        entry: ArchiveEntry,
    ) -> Result<()> {
        let name = entry.name.as_str();
        if name == "META-INF/MANIFEST.MF" {
            return Ok(());
        }
        // License files collide between a LICENSE file and a license/
        // directory of the same logical name; drop them all.
        if name.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("license")) {
            debug!(entry = %name, "skipping license entry");
            return Ok(());
        }
        // Service descriptors are merged, never deduped.
        if !name.starts_with(SERVICES_PREFIX) && !ctx.seen_paths.insert(name.to_string()) {
            debug!(entry = %name, "skipping duplicate entry");
            return Ok(());
        }

        if name.ends_with(CLASS_SUFFIX) {
            self.process_class(ctx, output, &entry)
        } else if let Some(descriptor_name) = name.strip_prefix(SERVICES_PREFIX) {
            self.process_service_descriptor(ctx, descriptor_name, &entry.content);
            Ok(())
        } else {
            self.process_resource(output, &entry)
        }
    }

    fn process_class(
        &self,
        ctx: &mut MergeContext,
        output: &mut dyn OutputSink,
        entry: &ArchiveEntry,
    ) -> Result<()> {
        let class_name = &entry.name[..entry.name.len() - CLASS_SUFFIX.len()];
        // A module descriptor would describe a bundled dependency, not
        // the merged artifact.
        if class_name == "module-info" {
            debug!("skipping module descriptor");
            return Ok(());
        }

        let mut class = ClassFile::parse(&entry.content)
            .map_err(|e| Error::for_class(class_name, e))?;
        tombstone::strip(&self.config, &mut class)
            .map_err(|e| Error::for_class(class_name, e))?;
        let excluded = remap::apply(&self.relocator, &self.config, &mut class)
            .map_err(|e| Error::for_class(class_name, e))?;

        let package = exclusion::parent_package(class_name);
        if excluded || ctx.excluded.is_excluded(package) {
            if class_name.ends_with("/package-info") {
                debug!(package = %package, "excluding package");
                ctx.excluded.exclude(package);
            }
            debug!(class = %class_name, "dropping excluded class");
            return Ok(());
        }

        let relocated = self
            .relocator
            .relocate(class_name)
            .unwrap_or_else(|| class_name.to_string());
        output.put(&format!("{relocated}{CLASS_SUFFIX}"), &class.to_bytes())
    }

    fn process_service_descriptor(
        &self,
        ctx: &mut MergeContext,
        descriptor_name: &str,
        content: &[u8],
    ) {
        ctx.services
            .merge_descriptor(&self.relocator, descriptor_name, content);
    }

    fn process_resource(&self, output: &mut dyn OutputSink, entry: &ArchiveEntry) -> Result<()> {
        for path in resources::relocated_paths(&self.relocator, &entry.name) {
            output.put(&path, &entry.content)?;
        }
        Ok(())
    }

    fn write_service_files(&self, ctx: &MergeContext, output: &mut dyn OutputSink) -> Result<()> {
        for (service, providers) in ctx.services.iter() {
            let content = providers.join("\n");
            output.put(
                &format!("{SERVICES_PREFIX}{service}"),
                content.as_bytes(),
            )?;
        }
        Ok(())
    }
}
