// src/lib.rs

//! jarmeld
//!
//! Merges many compiled JVM modules (class files, provider-registry
//! descriptors, resources) from multiple input archives into a single
//! combined archive, relocating a configurable subset of symbols so the
//! merged code can coexist with other versions of the same libraries.
//!
//! # Architecture
//!
//! - Oracle-driven: the engine never decides *what* moves; a
//!   [`Relocator`] answers per-name relocation queries
//! - Structural rewriting: class files are parsed into a constant-pool
//!   model, rewritten by appending-and-repointing pool entries, and
//!   re-serialized with all original indices intact
//! - Order-sensitive merging: package exclusions propagate within an
//!   archive, provider registries accumulate in encounter order, and
//!   duplicate paths are dropped first-writer-wins
//! - All-or-nothing: the first I/O or parse error aborts the merge and
//!   invalidates the output

pub mod archive;
pub mod classfile;
mod error;
pub mod progress;
pub mod relocate;
pub mod shade;

pub use archive::{ArchiveEntry, DirArchive, EntrySource, MemoryArchive, OutputSink};
pub use error::{Error, Result};
pub use progress::{CliProgress, LogProgress, ProgressTracker, SilentProgress};
pub use relocate::{ClassLiteralRemapping, PrefixRelocator, Relocator};
pub use shade::{JarMerger, MergeConfig, RemappingResult, SERVICES_PREFIX};
