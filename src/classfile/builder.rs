// src/classfile/builder.rs

//! Programmatic construction of class files
//!
//! Builds minimal but structurally valid class files from scratch. Used
//! by the test suites to produce fixtures without checked-in binaries;
//! also handy for tooling that needs synthetic classes.

use std::collections::HashMap;

use crate::classfile::constant_pool::{Constant, ConstantPool};
use crate::classfile::parser::{Attribute, ClassFile, Member};

const ACC_PUBLIC: u16 = 0x0001;
const ACC_STATIC: u16 = 0x0008;
const ACC_SUPER: u16 = 0x0020;

/// Builder for synthetic class files.
pub struct ClassBuilder {
    class: ClassFile,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
}

impl ClassBuilder {
    /// Start a public class with the given internal (slash-qualified)
    /// name, extending `java/lang/Object`.
    pub fn new(name: &str) -> Self {
        let mut builder = Self {
            class: ClassFile {
                minor_version: 0,
                major_version: 52, // Java 8 format
                pool: ConstantPool::new(),
                access_flags: ACC_PUBLIC | ACC_SUPER,
                this_class: 0,
                super_class: 0,
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                attributes: Vec::new(),
            },
            utf8_cache: HashMap::new(),
            class_cache: HashMap::new(),
        };
        builder.class.this_class = builder.class_entry(name);
        builder.class.super_class = builder.class_entry("java/lang/Object");
        builder
    }

    /// Intern a Utf8 entry.
    pub fn utf8(&mut self, value: &str) -> u16 {
        if let Some(&idx) = self.utf8_cache.get(value) {
            return idx;
        }
        let idx = self
            .class
            .pool
            .push(Constant::Utf8(value.as_bytes().to_vec()))
            .expect("builder pool overflow");
        self.utf8_cache.insert(value.to_string(), idx);
        idx
    }

    /// Intern a Class entry for an internal name.
    pub fn class_entry(&mut self, name: &str) -> u16 {
        if let Some(&idx) = self.class_cache.get(name) {
            return idx;
        }
        let name_idx = self.utf8(name);
        let idx = self
            .class
            .pool
            .push(Constant::Class { name: name_idx })
            .expect("builder pool overflow");
        self.class_cache.insert(name.to_string(), idx);
        idx
    }

    /// Add a String constant to the pool (class files may carry
    /// constants that no instruction references).
    pub fn string_constant(mut self, value: &str) -> Self {
        let value_idx = self.utf8(value);
        self.class
            .pool
            .push(Constant::String { value: value_idx })
            .expect("builder pool overflow");
        self
    }

    /// Add a Fieldref entry and return its index, for use in code.
    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_idx = self.class_entry(class);
        let name_idx = self.utf8(name);
        let desc_idx = self.utf8(descriptor);
        let nat = self
            .class
            .pool
            .push(Constant::NameAndType {
                name: name_idx,
                descriptor: desc_idx,
            })
            .expect("builder pool overflow");
        self.class
            .pool
            .push(Constant::FieldRef {
                class: class_idx,
                name_and_type: nat,
            })
            .expect("builder pool overflow")
    }

    /// Attach a marker annotation (by descriptor) to the class itself.
    pub fn annotate(mut self, descriptor: &str) -> Self {
        let attr = self.annotation_attribute(descriptor);
        self.class.attributes.push(attr);
        self
    }

    /// Add a field.
    pub fn field(mut self, name: &str, descriptor: &str) -> Self {
        let name_idx = self.utf8(name);
        let desc_idx = self.utf8(descriptor);
        self.class.fields.push(Member {
            access_flags: ACC_STATIC,
            name: name_idx,
            descriptor: desc_idx,
            attributes: Vec::new(),
        });
        self
    }

    /// Add a method with no code.
    pub fn method(self, name: &str, descriptor: &str) -> Self {
        self.method_full(name, descriptor, None, &[])
    }

    /// Add a method carrying a marker annotation.
    pub fn annotated_method(self, name: &str, descriptor: &str, annotation: &str) -> Self {
        self.method_full(name, descriptor, None, &[annotation.to_string()])
    }

    /// Add a method with a raw bytecode body.
    pub fn method_with_code(self, name: &str, descriptor: &str, code: Vec<u8>) -> Self {
        self.method_full(name, descriptor, Some(code), &[])
    }

    fn method_full(
        mut self,
        name: &str,
        descriptor: &str,
        code: Option<Vec<u8>>,
        annotations: &[String],
    ) -> Self {
        let name_idx = self.utf8(name);
        let desc_idx = self.utf8(descriptor);
        let mut attributes = Vec::new();
        if let Some(code) = code {
            let code_name = self.utf8("Code");
            let mut payload = Vec::new();
            payload.extend_from_slice(&2u16.to_be_bytes()); // max_stack
            payload.extend_from_slice(&2u16.to_be_bytes()); // max_locals
            payload.extend_from_slice(&(code.len() as u32).to_be_bytes());
            payload.extend_from_slice(&code);
            payload.extend_from_slice(&0u16.to_be_bytes()); // exception table
            payload.extend_from_slice(&0u16.to_be_bytes()); // attributes
            attributes.push(Attribute {
                name: code_name,
                payload,
            });
        }
        for annotation in annotations {
            let attr = self.annotation_attribute(annotation);
            attributes.push(attr);
        }
        self.class.methods.push(Member {
            access_flags: ACC_PUBLIC,
            name: name_idx,
            descriptor: desc_idx,
            attributes,
        });
        self
    }

    fn annotation_attribute(&mut self, descriptor: &str) -> Attribute {
        let attr_name = self.utf8("RuntimeVisibleAnnotations");
        let type_idx = self.utf8(descriptor);
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u16.to_be_bytes()); // num_annotations
        payload.extend_from_slice(&type_idx.to_be_bytes());
        payload.extend_from_slice(&0u16.to_be_bytes()); // no element/value pairs
        Attribute {
            name: attr_name,
            payload,
        }
    }

    pub fn build(self) -> Vec<u8> {
        self.class.to_bytes()
    }

    /// The parsed form, for tests that inspect structure directly.
    pub fn build_class(self) -> ClassFile {
        self.class
    }
}

