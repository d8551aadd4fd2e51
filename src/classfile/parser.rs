// src/classfile/parser.rs

//! Class file model: header, constant pool, members, attributes
//!
//! Attribute payloads are kept as raw bytes. Every constant pool index
//! embedded in a payload stays valid because rewrites only append pool
//! entries (see `constant_pool`), so payloads round-trip untouched. The
//! two payloads the engine does look inside (annotation tables, `Code`)
//! are handled by the `annotations` and `bytecode` modules.

use crate::classfile::constant_pool::{Constant, ConstantPool};
use crate::classfile::reader::ByteReader;
use crate::error::{Error, Result};

const MAGIC: u32 = 0xCAFE_BABE;

/// A field or method.
#[derive(Debug, Clone)]
pub struct Member {
    pub access_flags: u16,
    /// Utf8 index of the member name.
    pub name: u16,
    /// Utf8 index of the member descriptor.
    pub descriptor: u16,
    pub attributes: Vec<Attribute>,
}

/// An attribute with an unparsed payload.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Utf8 index of the attribute name.
    pub name: u16,
    pub payload: Vec<u8>,
}

/// A parsed class file.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        if r.u32()? != MAGIC {
            return Err(Error::Malformed("bad class file magic".into()));
        }
        let minor_version = r.u16()?;
        let major_version = r.u16()?;
        let pool = ConstantPool::parse(&mut r)?;
        let access_flags = r.u16()?;
        let this_class = r.u16()?;
        let super_class = r.u16()?;

        let interface_count = r.u16()? as usize;
        let mut interfaces = Vec::with_capacity(interface_count);
        for _ in 0..interface_count {
            interfaces.push(r.u16()?);
        }

        let fields = parse_members(&mut r)?;
        let methods = parse_members(&mut r)?;
        let attributes = parse_attributes(&mut r)?;

        if r.remaining() != 0 {
            return Err(Error::Malformed(format!(
                "{} trailing bytes after class structure",
                r.remaining()
            )));
        }

        Ok(Self {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&self.minor_version.to_be_bytes());
        out.extend_from_slice(&self.major_version.to_be_bytes());
        self.pool.write(&mut out);
        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for iface in &self.interfaces {
            out.extend_from_slice(&iface.to_be_bytes());
        }
        write_members(&mut out, &self.fields);
        write_members(&mut out, &self.methods);
        write_attributes(&mut out, &self.attributes);
        out
    }

    /// The class's own internal (slash-qualified) name.
    pub fn class_name(&self) -> Result<&str> {
        let name_index = match self.pool.get(self.this_class)? {
            Constant::Class { name } => *name,
            other => {
                return Err(Error::Malformed(format!(
                    "this_class does not point at a class constant (found {other:?})"
                )));
            }
        };
        self.pool
            .utf8(name_index)?
            .ok_or_else(|| Error::Malformed("class name is not valid UTF-8".into()))
    }

    /// Resolve an attribute's name.
    pub fn attribute_name(&self, attr: &Attribute) -> Result<&str> {
        self.pool
            .utf8(attr.name)?
            .ok_or_else(|| Error::Malformed("attribute name is not valid UTF-8".into()))
    }
}

fn parse_members(r: &mut ByteReader<'_>) -> Result<Vec<Member>> {
    let count = r.u16()? as usize;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        let access_flags = r.u16()?;
        let name = r.u16()?;
        let descriptor = r.u16()?;
        let attributes = parse_attributes(r)?;
        members.push(Member {
            access_flags,
            name,
            descriptor,
            attributes,
        });
    }
    Ok(members)
}

fn parse_attributes(r: &mut ByteReader<'_>) -> Result<Vec<Attribute>> {
    let count = r.u16()? as usize;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        let name = r.u16()?;
        let len = r.u32()? as usize;
        let payload = r.bytes(len)?.to_vec();
        attributes.push(Attribute { name, payload });
    }
    Ok(attributes)
}

fn write_members(out: &mut Vec<u8>, members: &[Member]) {
    out.extend_from_slice(&(members.len() as u16).to_be_bytes());
    for m in members {
        out.extend_from_slice(&m.access_flags.to_be_bytes());
        out.extend_from_slice(&m.name.to_be_bytes());
        out.extend_from_slice(&m.descriptor.to_be_bytes());
        write_attributes(out, &m.attributes);
    }
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[Attribute]) {
    out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for a in attributes {
        out.extend_from_slice(&a.name.to_be_bytes());
        out.extend_from_slice(&(a.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&a.payload);
    }
}
