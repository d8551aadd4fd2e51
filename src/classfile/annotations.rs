// src/classfile/annotations.rs

//! Annotation table traversal
//!
//! Walks `RuntimeVisibleAnnotations`/`RuntimeInvisibleAnnotations`
//! payloads for two purposes: marker detection (does this class or
//! method carry a given annotation type?) and descriptor relocation.
//! The walker records the payload offset of every pool index that holds
//! a type descriptor (the annotation type itself, enum element types,
//! class-literal element values), so relocation can repoint those
//! indices in place without re-encoding the payload.

use crate::classfile::constant_pool::ConstantPool;
use crate::classfile::parser::Attribute;
use crate::classfile::reader::ByteReader;
use crate::error::{Error, Result};

const VISIBLE_TABLE: &str = "RuntimeVisibleAnnotations";
const INVISIBLE_TABLE: &str = "RuntimeInvisibleAnnotations";

fn is_annotation_table(pool: &ConstantPool, attr: &Attribute) -> Result<bool> {
    let name = pool.utf8(attr.name)?;
    Ok(name == Some(VISIBLE_TABLE) || name == Some(INVISIBLE_TABLE))
}

/// Does any annotation in `attributes` have the given type descriptor?
pub fn has_annotation(
    pool: &ConstantPool,
    attributes: &[Attribute],
    descriptor: &str,
) -> Result<bool> {
    let mut scratch = Vec::new();
    for attr in attributes {
        if !is_annotation_table(pool, attr)? {
            continue;
        }
        let mut r = ByteReader::new(&attr.payload);
        let count = r.u16()?;
        for _ in 0..count {
            let type_index = walk_annotation(&mut r, &mut scratch)?;
            if pool.utf8(type_index)? == Some(descriptor) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Rewrite every type descriptor referenced from the annotation tables
/// in `attributes`. `remap` returns the replacement descriptor, or
/// `None` to keep the original. Replacements are appended to the pool
/// and the payload indices repointed in place; payload length never
/// changes.
pub fn rewrite_descriptors(
    pool: &mut ConstantPool,
    attributes: &mut [Attribute],
    mut remap: impl FnMut(&str) -> Option<String>,
) -> Result<()> {
    for attr in attributes.iter_mut() {
        if !is_annotation_table(pool, attr)? {
            continue;
        }
        let mut offsets = Vec::new();
        let mut r = ByteReader::new(&attr.payload);
        let count = r.u16()?;
        for _ in 0..count {
            walk_annotation(&mut r, &mut offsets)?;
        }
        for offset in offsets {
            let index = u16::from_be_bytes([attr.payload[offset], attr.payload[offset + 1]]);
            let Some(value) = pool.utf8(index)? else {
                continue;
            };
            let Some(replacement) = remap(value) else {
                continue;
            };
            let new_index = pool.push_utf8(&replacement)?;
            attr.payload[offset..offset + 2].copy_from_slice(&new_index.to_be_bytes());
        }
    }
    Ok(())
}

/// Walk one annotation structure, returning its type descriptor index
/// and recording the payload offsets of all descriptor-holding indices.
fn walk_annotation(r: &mut ByteReader<'_>, descriptor_offsets: &mut Vec<usize>) -> Result<u16> {
    descriptor_offsets.push(r.position());
    let type_index = r.u16()?;
    let pairs = r.u16()?;
    for _ in 0..pairs {
        r.skip(2)?; // element name
        walk_element_value(r, descriptor_offsets)?;
    }
    Ok(type_index)
}

fn walk_element_value(r: &mut ByteReader<'_>, descriptor_offsets: &mut Vec<usize>) -> Result<()> {
    let tag = r.u8()?;
    match tag {
        // Primitive and string constants: a single pool index.
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => r.skip(2),
        // Enum constant: type descriptor + constant name.
        b'e' => {
            descriptor_offsets.push(r.position());
            r.skip(4)
        }
        // Class literal: a return descriptor index.
        b'c' => {
            descriptor_offsets.push(r.position());
            r.skip(2)
        }
        // Nested annotation.
        b'@' => walk_annotation(r, descriptor_offsets).map(|_| ()),
        // Array of element values.
        b'[' => {
            let len = r.u16()?;
            for _ in 0..len {
                walk_element_value(r, descriptor_offsets)?;
            }
            Ok(())
        }
        other => Err(Error::Malformed(format!(
            "unknown annotation element tag {other:#04x}"
        ))),
    }
}
