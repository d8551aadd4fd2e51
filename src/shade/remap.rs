// src/shade/remap.rs

//! Symbol relocation over one parsed class
//!
//! Rewrite rules, applied in order:
//!
//! 1. exclusion-marker detection on the class's own annotations (checked
//!    against the original, pre-rewrite descriptors),
//! 2. class-literal cache fields (`Class`-typed fields the oracle
//!    remaps) are renamed, recording original literal -> replacement,
//! 3. GETSTATIC/PUTSTATIC accesses to `Class`-typed fields the oracle
//!    remaps are repointed at a freshly appended Fieldref,
//! 4. string constants: the recorded literal map first, then the string
//!    as a slash-qualified name, then as a dot-qualified name (first
//!    hit wins),
//! 5. class references, including array descriptors,
//! 6. field/method/NameAndType/MethodType descriptors,
//! 7. annotation type descriptors on the class, its fields and its
//!    methods (including enum and class-literal element values).

use std::collections::HashMap;

use tracing::debug;

use crate::classfile::annotations;
use crate::classfile::bytecode;
use crate::classfile::constant_pool::Constant;
use crate::classfile::parser::ClassFile;
use crate::error::{Error, Result};
use crate::relocate::Relocator;
use crate::shade::{CLASS_DESC, MergeConfig};

/// Outcome of relocating one module.
#[derive(Debug)]
pub struct RemappingResult {
    /// The rewritten module.
    pub bytes: Vec<u8>,
    /// Whether the module carried the exclusion marker. The bytes are
    /// still fully rewritten; the pipeline decides what exclusion means.
    pub excluded: bool,
}

/// Byte-level contract: parse, rewrite, re-serialize. A parse failure is
/// wrapped with the offending module's name and is fatal to the merge.
pub fn remap_class(
    relocator: &dyn Relocator,
    config: &MergeConfig,
    class_name: &str,
    bytes: &[u8],
) -> Result<RemappingResult> {
    let mut class = ClassFile::parse(bytes).map_err(|e| Error::for_class(class_name, e))?;
    let excluded =
        apply(relocator, config, &mut class).map_err(|e| Error::for_class(class_name, e))?;
    Ok(RemappingResult {
        bytes: class.to_bytes(),
        excluded,
    })
}

/// Apply all rewrite rules to a parsed class. Returns the exclusion flag.
pub(crate) fn apply(
    relocator: &dyn Relocator,
    config: &MergeConfig,
    class: &mut ClassFile,
) -> Result<bool> {
    let excluded =
        annotations::has_annotation(&class.pool, &class.attributes, &config.exclude_annotation)?;
    let literal_map = rename_class_literal_fields(relocator, class)?;
    rewrite_static_field_accesses(relocator, class)?;
    rewrite_string_constants(relocator, class, &literal_map)?;
    rewrite_class_references(relocator, class)?;
    rewrite_descriptors(relocator, class)?;
    rewrite_annotation_types(relocator, class)?;
    Ok(excluded)
}

/// Rename `Class`-typed cache fields the oracle remaps, collecting the
/// literal substitutions for the string-constant pass. Replacements are
/// stored dot-qualified, matching the form the literals take at runtime.
fn rename_class_literal_fields(
    relocator: &dyn Relocator,
    class: &mut ClassFile,
) -> Result<HashMap<String, String>> {
    let mut literal_map = HashMap::new();
    let ClassFile { pool, fields, .. } = class;
    for field in fields.iter_mut() {
        if pool.utf8(field.descriptor)? != Some(CLASS_DESC) {
            continue;
        }
        let Some(name) = pool.utf8(field.name)? else {
            continue;
        };
        let Some(remapping) = relocator.remap_class_literal_field(name) else {
            continue;
        };
        debug!(field = %name, replacement = %remapping.field_name_replacement, "renaming class-literal field");
        field.name = pool.push_utf8(&remapping.field_name_replacement)?;
        literal_map.insert(
            remapping.literal,
            remapping.literal_replacement.replace('/', "."),
        );
    }
    Ok(literal_map)
}

/// Repoint GETSTATIC/PUTSTATIC operands whose target is a `Class`-typed
/// field with a literal remapping. The accessed field name changes; the
/// declaring class does not.
fn rewrite_static_field_accesses(relocator: &dyn Relocator, class: &mut ClassFile) -> Result<()> {
    let ClassFile { pool, methods, .. } = class;
    let mut rewritten: HashMap<u16, u16> = HashMap::new();
    for method in methods.iter_mut() {
        for attr in method.attributes.iter_mut() {
            if pool.utf8(attr.name)? != Some("Code") {
                continue;
            }
            if attr.payload.len() < 8 {
                return Err(Error::Malformed("truncated Code attribute".into()));
            }
            let code_len =
                u32::from_be_bytes([attr.payload[4], attr.payload[5], attr.payload[6], attr.payload[7]])
                    as usize;
            let code_end = 8usize
                .checked_add(code_len)
                .filter(|&end| end <= attr.payload.len())
                .ok_or_else(|| {
                    Error::Malformed("Code attribute shorter than its code length".into())
                })?;
            let code = &mut attr.payload[8..code_end];
            bytecode::patch_static_field_ops(code, |index| {
                if let Some(&new_index) = rewritten.get(&index) {
                    return Ok(Some(new_index));
                }
                let (owner, name_and_type) = match pool.get(index)? {
                    Constant::FieldRef {
                        class,
                        name_and_type,
                    } => (*class, *name_and_type),
                    _ => return Ok(None),
                };
                let (name, descriptor) = match pool.get(name_and_type)? {
                    Constant::NameAndType { name, descriptor } => (*name, *descriptor),
                    _ => return Ok(None),
                };
                if pool.utf8(descriptor)? != Some(CLASS_DESC) {
                    return Ok(None);
                }
                let Some(field_name) = pool.utf8(name)? else {
                    return Ok(None);
                };
                let Some(remapping) = relocator.remap_class_literal_field(field_name) else {
                    return Ok(None);
                };
                let new_name = pool.push_utf8(&remapping.field_name_replacement)?;
                let new_nat = pool.push(Constant::NameAndType {
                    name: new_name,
                    descriptor,
                })?;
                let new_ref = pool.push(Constant::FieldRef {
                    class: owner,
                    name_and_type: new_nat,
                })?;
                rewritten.insert(index, new_ref);
                Ok(Some(new_ref))
            })?;
        }
    }
    Ok(())
}

/// Rewrite string constants. Lookup order: exact literal map, the string
/// as a slash-qualified name, the string as a dot-qualified name
/// (slashes swapped in for the oracle, then back out).
fn rewrite_string_constants(
    relocator: &dyn Relocator,
    class: &mut ClassFile,
    literal_map: &HashMap<String, String>,
) -> Result<()> {
    let pool = &mut class.pool;
    let string_indices = pool.indices_where(|c| matches!(c, Constant::String { .. }));
    for index in string_indices {
        let value_index = match pool.get(index)? {
            Constant::String { value } => *value,
            _ => continue,
        };
        let Some(value) = pool.utf8(value_index)? else {
            continue;
        };
        let value = value.to_string();
        let Some(replacement) = rewrite_string(relocator, literal_map, &value) else {
            continue;
        };
        if replacement == value {
            continue;
        }
        debug!(from = %value, to = %replacement, "rewriting string constant");
        let new_index = pool.push_utf8(&replacement)?;
        if let Constant::String { value } = pool.get_mut(index)? {
            *value = new_index;
        }
    }
    Ok(())
}

fn rewrite_string(
    relocator: &dyn Relocator,
    literal_map: &HashMap<String, String>,
    value: &str,
) -> Option<String> {
    if let Some(mapped) = literal_map.get(value) {
        return Some(mapped.clone());
    }
    if let Some(relocated) = relocator.relocate(value) {
        return Some(relocated);
    }
    relocator
        .relocate(&value.replace('.', "/"))
        .map(|relocated| relocated.replace('/', "."))
}

/// Rewrite every class reference in the pool (covers `this`, the super
/// class, interfaces, and all owner-class references).
fn rewrite_class_references(relocator: &dyn Relocator, class: &mut ClassFile) -> Result<()> {
    let pool = &mut class.pool;
    let class_indices = pool.indices_where(|c| matches!(c, Constant::Class { .. }));
    for index in class_indices {
        let name_index = match pool.get(index)? {
            Constant::Class { name } => *name,
            _ => continue,
        };
        let Some(name) = pool.utf8(name_index)? else {
            continue;
        };
        let name = name.to_string();
        // Array "class names" are descriptors; remap the element type.
        let replacement = if name.starts_with('[') {
            remap_descriptor(relocator, &name)
        } else {
            relocator.relocate(&name)
        };
        let Some(replacement) = replacement else {
            continue;
        };
        if replacement == name {
            continue;
        }
        let new_index = pool.push_utf8(&replacement)?;
        if let Constant::Class { name } = pool.get_mut(index)? {
            *name = new_index;
        }
    }
    Ok(())
}

/// Rewrite field/method descriptors on members, NameAndType entries and
/// MethodType entries.
fn rewrite_descriptors(relocator: &dyn Relocator, class: &mut ClassFile) -> Result<()> {
    let ClassFile {
        pool,
        fields,
        methods,
        ..
    } = class;

    for member in fields.iter_mut().chain(methods.iter_mut()) {
        let Some(descriptor) = pool.utf8(member.descriptor)? else {
            continue;
        };
        if let Some(replacement) = remap_descriptor(relocator, descriptor) {
            member.descriptor = pool.push_utf8(&replacement)?;
        }
    }

    let nat_indices = pool.indices_where(|c| {
        matches!(
            c,
            Constant::NameAndType { .. } | Constant::MethodType { .. }
        )
    });
    for index in nat_indices {
        let descriptor_index = match pool.get(index)? {
            Constant::NameAndType { descriptor, .. } => *descriptor,
            Constant::MethodType { descriptor } => *descriptor,
            _ => continue,
        };
        let Some(descriptor) = pool.utf8(descriptor_index)? else {
            continue;
        };
        let Some(replacement) = remap_descriptor(relocator, descriptor) else {
            continue;
        };
        let new_index = pool.push_utf8(&replacement)?;
        match pool.get_mut(index)? {
            Constant::NameAndType { descriptor, .. } => *descriptor = new_index,
            Constant::MethodType { descriptor } => *descriptor = new_index,
            _ => {}
        }
    }
    Ok(())
}

/// Relocate annotation type descriptors in the class-, field- and
/// method-level annotation tables. Runs after the marker checks, which
/// must see the original descriptors.
fn rewrite_annotation_types(relocator: &dyn Relocator, class: &mut ClassFile) -> Result<()> {
    let ClassFile {
        pool,
        fields,
        methods,
        attributes,
        ..
    } = class;
    annotations::rewrite_descriptors(pool, attributes, |d| remap_descriptor(relocator, d))?;
    for member in fields.iter_mut().chain(methods.iter_mut()) {
        annotations::rewrite_descriptors(pool, &mut member.attributes, |d| {
            remap_descriptor(relocator, d)
        })?;
    }
    Ok(())
}

/// Remap every object type inside a field or method descriptor.
/// `None` means nothing changed.
fn remap_descriptor(relocator: &dyn Relocator, descriptor: &str) -> Option<String> {
    let mut out = String::with_capacity(descriptor.len());
    let mut changed = false;
    let mut i = 0;
    while i < descriptor.len() {
        let rest = &descriptor[i..];
        if let Some(after) = rest.strip_prefix('L') {
            let Some(semi) = after.find(';') else {
                // Malformed tail; keep it untouched.
                out.push_str(rest);
                break;
            };
            let name = &after[..semi];
            match relocator.relocate(name) {
                Some(replacement) => {
                    changed = true;
                    out.push('L');
                    out.push_str(&replacement);
                    out.push(';');
                }
                None => out.push_str(&rest[..semi + 2]),
            }
            i += semi + 2;
        } else {
            let Some(ch) = rest.chars().next() else {
                break;
            };
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    changed.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::ClassBuilder;
    use crate::relocate::PrefixRelocator;

    fn relocator() -> PrefixRelocator {
        PrefixRelocator::new().rule("com/acme", "shaded/acme")
    }

    fn config() -> MergeConfig {
        MergeConfig::default()
    }

    fn pool_utf8_values(class: &ClassFile) -> Vec<String> {
        let mut values = Vec::new();
        for i in 1..class.pool.len() as u16 {
            if let Ok(Some(s)) = class.pool.utf8(i) {
                values.push(s.to_string());
            }
        }
        values
    }

    #[test]
    fn remaps_descriptor_object_types() {
        let r = relocator();
        assert_eq!(
            remap_descriptor(&r, "(JLcom/acme/Foo;)Lcom/acme/Bar;").as_deref(),
            Some("(JLshaded/acme/Foo;)Lshaded/acme/Bar;")
        );
        assert_eq!(
            remap_descriptor(&r, "[[Lcom/acme/Foo;").as_deref(),
            Some("[[Lshaded/acme/Foo;")
        );
        assert_eq!(remap_descriptor(&r, "(II)V"), None);
        assert_eq!(remap_descriptor(&r, "(Lorg/other/Baz;)V"), None);
    }

    #[test]
    fn relocates_the_class_own_name() {
        let bytes = ClassBuilder::new("com/acme/Foo").build();
        let result = remap_class(&relocator(), &config(), "com/acme/Foo", &bytes).unwrap();
        assert!(!result.excluded);
        let rewritten = ClassFile::parse(&result.bytes).unwrap();
        assert_eq!(rewritten.class_name().unwrap(), "shaded/acme/Foo");
    }

    #[test]
    fn declined_references_stay_untouched() {
        let bytes = ClassBuilder::new("org/other/Bar")
            .string_constant("org.other.Baz")
            .method("f", "(Lorg/other/Baz;)V")
            .build();
        let result = remap_class(&relocator(), &config(), "org/other/Bar", &bytes).unwrap();
        assert_eq!(result.bytes, bytes, "a class with no relocatable references must round-trip");
    }

    #[test]
    fn detects_the_exclusion_marker_but_still_rewrites() {
        let cfg = config();
        let bytes = ClassBuilder::new("com/acme/Foo")
            .annotate(&cfg.exclude_annotation)
            .build();
        let result = remap_class(&relocator(), &cfg, "com/acme/Foo", &bytes).unwrap();
        assert!(result.excluded);
        let rewritten = ClassFile::parse(&result.bytes).unwrap();
        assert_eq!(rewritten.class_name().unwrap(), "shaded/acme/Foo");
    }

    #[test]
    fn rewrites_slash_qualified_string_constants() {
        let bytes = ClassBuilder::new("com/acme/Foo")
            .string_constant("com/acme/Helper")
            .build();
        let result = remap_class(&relocator(), &config(), "com/acme/Foo", &bytes).unwrap();
        let rewritten = ClassFile::parse(&result.bytes).unwrap();
        assert!(
            pool_utf8_values(&rewritten).iter().any(|s| s == "shaded/acme/Helper"),
            "slash-qualified literal must be relocated"
        );
    }

    #[test]
    fn rewrites_dot_qualified_string_constants_preserving_dots() {
        let bytes = ClassBuilder::new("com/acme/Foo")
            .string_constant("com.acme.Helper")
            .build();
        let result = remap_class(&relocator(), &config(), "com/acme/Foo", &bytes).unwrap();
        let rewritten = ClassFile::parse(&result.bytes).unwrap();
        assert!(
            pool_utf8_values(&rewritten).iter().any(|s| s == "shaded.acme.Helper"),
            "dot-qualified literal must come back dot-qualified"
        );
    }

    #[test]
    fn renames_class_literal_fields_and_their_literals() {
        let bytes = ClassBuilder::new("com/acme/Foo")
            .field("class$com$acme$Foo", CLASS_DESC)
            .string_constant("com.acme.Foo")
            .build();
        let result = remap_class(&relocator(), &config(), "com/acme/Foo", &bytes).unwrap();
        let rewritten = ClassFile::parse(&result.bytes).unwrap();

        let field_name = rewritten
            .pool
            .utf8(rewritten.fields[0].name)
            .unwrap()
            .unwrap();
        assert_eq!(field_name, "class$shaded$acme$Foo");
        assert!(
            pool_utf8_values(&rewritten).iter().any(|s| s == "shaded.acme.Foo"),
            "the cached literal must follow the field rename"
        );
    }

    #[test]
    fn rewrites_static_accesses_to_remapped_literal_fields() {
        let mut builder = ClassBuilder::new("com/acme/Foo");
        let field_ref = builder.field_ref("com/acme/Foo", "class$com$acme$Bar", CLASS_DESC);
        let code = vec![
            0xb2, // getstatic
            (field_ref >> 8) as u8,
            field_ref as u8,
            0xb1, // return
        ];
        let bytes = builder.method_with_code("get", "()V", code).build();

        let result = remap_class(&relocator(), &config(), "com/acme/Foo", &bytes).unwrap();
        let rewritten = ClassFile::parse(&result.bytes).unwrap();

        // Find the method's code and resolve the patched Fieldref.
        let method = &rewritten.methods[0];
        let code_attr = method
            .attributes
            .iter()
            .find(|a| rewritten.pool.utf8(a.name).unwrap() == Some("Code"))
            .expect("method must keep its Code attribute");
        let patched = u16::from_be_bytes([code_attr.payload[9], code_attr.payload[10]]);
        let (_, nat) = match rewritten.pool.get(patched).unwrap() {
            Constant::FieldRef {
                class,
                name_and_type,
            } => (*class, *name_and_type),
            other => panic!("patched operand is not a Fieldref: {other:?}"),
        };
        let name_index = match rewritten.pool.get(nat).unwrap() {
            Constant::NameAndType { name, .. } => *name,
            other => panic!("unexpected entry: {other:?}"),
        };
        assert_eq!(
            rewritten.pool.utf8(name_index).unwrap(),
            Some("class$shaded$acme$Bar"),
            "the accessed field name must be rewritten"
        );
    }

    #[test]
    fn relocates_annotation_type_descriptors() {
        let bytes = ClassBuilder::new("com/acme/User")
            .annotate("Lcom/acme/Anno;")
            .annotated_method("f", "()V", "Lcom/acme/MethodAnno;")
            .build();
        let result = remap_class(&relocator(), &config(), "com/acme/User", &bytes).unwrap();
        let rewritten = ClassFile::parse(&result.bytes).unwrap();
        assert!(
            annotations::has_annotation(
                &rewritten.pool,
                &rewritten.attributes,
                "Lshaded/acme/Anno;"
            )
            .unwrap(),
            "class-level annotation type must be relocated"
        );
        assert!(
            annotations::has_annotation(
                &rewritten.pool,
                &rewritten.methods[0].attributes,
                "Lshaded/acme/MethodAnno;"
            )
            .unwrap(),
            "method-level annotation type must be relocated"
        );
    }

    #[test]
    fn parse_failures_name_the_offending_class() {
        let err = remap_class(&relocator(), &config(), "com/acme/Broken", b"not a class")
            .unwrap_err();
        assert!(
            err.to_string().contains("com/acme/Broken"),
            "error must name the module: {err}"
        );
    }
}
