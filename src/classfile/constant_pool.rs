// src/classfile/constant_pool.rs

//! Constant pool parsing, mutation and serialization
//!
//! The pool is modeled as tagged variants indexed exactly as in the
//! class file (slot 0 unused, `Long`/`Double` occupy two slots). Rewrites
//! never mutate a `Utf8` in place: entries may be shared between roles
//! (a class name and a string literal, a descriptor and a signature), so
//! new entries are appended and the referencing entry is re-pointed.
//! Original indices therefore stay valid, which keeps raw attribute
//! payloads (StackMapTable, InnerClasses, ...) correct without touching
//! them.

use std::collections::HashMap;

use crate::classfile::reader::ByteReader;
use crate::error::{Error, Result};

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// One constant pool entry.
///
/// String payloads are kept as raw bytes: the format uses modified UTF-8,
/// and entries we never rewrite must round-trip byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name: u16 },
    String { value: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
    /// Second slot of a `Long`/`Double`, and the unused slot 0.
    Unusable,
}

/// The constant pool of one class file.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    /// Content -> index cache for appended Utf8 entries, so repeated
    /// rewrites of the same string share one new entry.
    appended_utf8: HashMap<Vec<u8>, u16>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// An empty pool (slot 0 only).
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
            appended_utf8: HashMap::new(),
        }
    }

    /// Parse `constant_pool_count` and the entries that follow.
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        let count = r.u16()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);
        while entries.len() < count {
            let tag = r.u8()?;
            let entry = match tag {
                TAG_UTF8 => {
                    let len = r.u16()? as usize;
                    Constant::Utf8(r.bytes(len)?.to_vec())
                }
                TAG_INTEGER => Constant::Integer(r.u32()?),
                TAG_FLOAT => Constant::Float(r.u32()?),
                TAG_LONG => Constant::Long(((r.u32()? as u64) << 32) | r.u32()? as u64),
                TAG_DOUBLE => Constant::Double(((r.u32()? as u64) << 32) | r.u32()? as u64),
                TAG_CLASS => Constant::Class { name: r.u16()? },
                TAG_STRING => Constant::String { value: r.u16()? },
                TAG_FIELDREF => Constant::FieldRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                TAG_METHODREF => Constant::MethodRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                TAG_INTERFACE_METHODREF => Constant::InterfaceMethodRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                TAG_NAME_AND_TYPE => Constant::NameAndType {
                    name: r.u16()?,
                    descriptor: r.u16()?,
                },
                TAG_METHOD_HANDLE => Constant::MethodHandle {
                    kind: r.u8()?,
                    reference: r.u16()?,
                },
                TAG_METHOD_TYPE => Constant::MethodType { descriptor: r.u16()? },
                TAG_DYNAMIC => Constant::Dynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                TAG_MODULE => Constant::Module { name: r.u16()? },
                TAG_PACKAGE => Constant::Package { name: r.u16()? },
                other => {
                    return Err(Error::Malformed(format!(
                        "unknown constant pool tag {other}"
                    )));
                }
            };
            let double_width = matches!(entry, Constant::Long(_) | Constant::Double(_));
            entries.push(entry);
            if double_width {
                entries.push(Constant::Unusable);
            }
        }
        if entries.len() != count {
            return Err(Error::Malformed(
                "constant pool count does not match entries".into(),
            ));
        }
        Ok(Self {
            entries,
            appended_utf8: HashMap::new(),
        })
    }

    /// Serialize the pool, including the leading count.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for entry in self.entries.iter().skip(1) {
            match entry {
                Constant::Utf8(bytes) => {
                    out.push(TAG_UTF8);
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(bytes);
                }
                Constant::Integer(v) => {
                    out.push(TAG_INTEGER);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Float(v) => {
                    out.push(TAG_FLOAT);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Long(v) => {
                    out.push(TAG_LONG);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Double(v) => {
                    out.push(TAG_DOUBLE);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Class { name } => {
                    out.push(TAG_CLASS);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Constant::String { value } => {
                    out.push(TAG_STRING);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                Constant::FieldRef { class, name_and_type } => {
                    out.push(TAG_FIELDREF);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Constant::MethodRef { class, name_and_type } => {
                    out.push(TAG_METHODREF);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Constant::InterfaceMethodRef { class, name_and_type } => {
                    out.push(TAG_INTERFACE_METHODREF);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Constant::NameAndType { name, descriptor } => {
                    out.push(TAG_NAME_AND_TYPE);
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
                Constant::MethodHandle { kind, reference } => {
                    out.push(TAG_METHOD_HANDLE);
                    out.push(*kind);
                    out.extend_from_slice(&reference.to_be_bytes());
                }
                Constant::MethodType { descriptor } => {
                    out.push(TAG_METHOD_TYPE);
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
                Constant::Dynamic { bootstrap, name_and_type } => {
                    out.push(TAG_DYNAMIC);
                    out.extend_from_slice(&bootstrap.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Constant::InvokeDynamic { bootstrap, name_and_type } => {
                    out.push(TAG_INVOKE_DYNAMIC);
                    out.extend_from_slice(&bootstrap.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Constant::Module { name } => {
                    out.push(TAG_MODULE);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Constant::Package { name } => {
                    out.push(TAG_PACKAGE);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Constant::Unusable => {}
            }
        }
    }

    /// Number of pool slots, including slot 0 and long/double fillers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&Constant> {
        self.entries
            .get(index as usize)
            .filter(|c| !matches!(c, Constant::Unusable))
            .ok_or_else(|| Error::Malformed(format!("invalid constant pool index {index}")))
    }

    pub fn get_mut(&mut self, index: u16) -> Result<&mut Constant> {
        self.entries
            .get_mut(index as usize)
            .filter(|c| !matches!(c, Constant::Unusable))
            .ok_or_else(|| Error::Malformed(format!("invalid constant pool index {index}")))
    }

    /// Resolve a Utf8 entry. Fails on a dangling index or a non-Utf8
    /// entry; returns `None` when the bytes are not valid UTF-8 (such an
    /// entry can still round-trip, it just never matches a rewrite).
    pub fn utf8(&self, index: u16) -> Result<Option<&str>> {
        match self.get(index)? {
            Constant::Utf8(bytes) => Ok(std::str::from_utf8(bytes).ok()),
            other => Err(Error::Malformed(format!(
                "constant pool index {index} is not Utf8 (found {other:?})"
            ))),
        }
    }

    /// Append a new entry, failing if the pool would overflow u16.
    pub fn push(&mut self, entry: Constant) -> Result<u16> {
        let slots = if matches!(entry, Constant::Long(_) | Constant::Double(_)) {
            2
        } else {
            1
        };
        if self.entries.len() + slots > u16::MAX as usize {
            return Err(Error::Malformed("constant pool overflow".into()));
        }
        let index = self.entries.len() as u16;
        let double_width = slots == 2;
        self.entries.push(entry);
        if double_width {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    /// Append a Utf8 entry, reusing a previously appended identical one.
    pub fn push_utf8(&mut self, value: &str) -> Result<u16> {
        if let Some(&index) = self.appended_utf8.get(value.as_bytes()) {
            return Ok(index);
        }
        let index = self.push(Constant::Utf8(value.as_bytes().to_vec()))?;
        self.appended_utf8.insert(value.as_bytes().to_vec(), index);
        Ok(index)
    }

    /// Indices of entries matching a predicate, in pool order.
    pub fn indices_where(&self, mut pred: impl FnMut(&Constant) -> bool) -> Vec<u16> {
        self.entries
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, c)| pred(c))
            .map(|(i, _)| i as u16)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pool() -> ConstantPool {
        let mut pool = ConstantPool::new();
        pool.push(Constant::Utf8(b"com/acme/Foo".to_vec())).unwrap();
        pool.push(Constant::Class { name: 1 }).unwrap();
        pool
    }

    #[test]
    fn round_trips_through_serialization() {
        let pool = sample_pool();
        let mut bytes = Vec::new();
        pool.write(&mut bytes);

        let mut r = ByteReader::new(&bytes);
        let reparsed = ConstantPool::parse(&mut r).unwrap();
        assert_eq!(reparsed.len(), pool.len());
        assert_eq!(reparsed.utf8(1).unwrap(), Some("com/acme/Foo"));
        assert!(matches!(reparsed.get(2).unwrap(), Constant::Class { name: 1 }));
    }

    #[test]
    fn long_occupies_two_slots() {
        let mut pool = sample_pool();
        let idx = pool.push(Constant::Long(42)).unwrap();
        assert_eq!(idx, 3);
        assert_eq!(pool.len(), 5);
        assert!(pool.get(4).is_err(), "filler slot must be unusable");

        let mut bytes = Vec::new();
        pool.write(&mut bytes);
        let mut r = ByteReader::new(&bytes);
        let reparsed = ConstantPool::parse(&mut r).unwrap();
        assert!(matches!(reparsed.get(3).unwrap(), Constant::Long(42)));
    }

    #[test]
    fn appended_utf8_is_deduplicated() {
        let mut pool = sample_pool();
        let a = pool.push_utf8("shaded/acme/Foo").unwrap();
        let b = pool.push_utf8("shaded/acme/Foo").unwrap();
        assert_eq!(a, b);
    }
}
