// src/classfile/mod.rs

//! Class file parsing, mutation and serialization
//!
//! A structural model of the compiled-module format: the constant pool
//! as tagged variants, fields/methods/attributes, plus focused walkers
//! for the two attribute payloads the merge engine inspects (annotation
//! tables and `Code`). Rewrites are append-and-repoint: original pool
//! indices stay valid, so untouched payloads round-trip byte-for-byte.

pub mod annotations;
pub mod builder;
pub mod bytecode;
pub mod constant_pool;
pub mod parser;
pub mod reader;

pub use builder::ClassBuilder;
pub use constant_pool::{Constant, ConstantPool};
pub use parser::{Attribute, ClassFile, Member};
