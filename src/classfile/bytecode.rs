// src/classfile/bytecode.rs

//! Bytecode traversal for in-place operand patching
//!
//! Instruction lengths never change: a rewritten field access keeps its
//! two-byte pool operand and points at an appended Fieldref entry, so
//! branch offsets, the exception table and StackMapTable frames all stay
//! valid without relocation of code offsets.

use crate::error::{Error, Result};

const OP_GETSTATIC: u8 = 0xb2;
const OP_PUTSTATIC: u8 = 0xb3;
const OP_TABLESWITCH: u8 = 0xaa;
const OP_LOOKUPSWITCH: u8 = 0xab;
const OP_WIDE: u8 = 0xc4;
const OP_IINC: u8 = 0x84;

/// Walk `code`, invoking `patch` with the pool operand of every
/// GETSTATIC/PUTSTATIC. A `Some(new_index)` return rewrites the operand
/// in place.
pub fn patch_static_field_ops(
    code: &mut [u8],
    mut patch: impl FnMut(u16) -> Result<Option<u16>>,
) -> Result<()> {
    let mut pc = 0usize;
    while pc < code.len() {
        let op = code[pc];
        if op == OP_GETSTATIC || op == OP_PUTSTATIC {
            if pc + 2 >= code.len() {
                return Err(Error::Malformed("truncated field instruction".into()));
            }
            let index = u16::from_be_bytes([code[pc + 1], code[pc + 2]]);
            if let Some(new_index) = patch(index)? {
                code[pc + 1..pc + 3].copy_from_slice(&new_index.to_be_bytes());
            }
        }
        pc += instruction_len(code, pc)?;
    }
    Ok(())
}

/// Length of the instruction at `pc`, including the opcode byte.
fn instruction_len(code: &[u8], pc: usize) -> Result<usize> {
    let op = code[pc];
    let len = match op {
        // Single-byte instructions: constants, loads/stores with
        // embedded indices, stack ops, arithmetic, conversions,
        // comparisons, returns, array ops, monitors.
        0x00..=0x0f
        | 0x1a..=0x35
        | 0x3b..=0x83
        | 0x85..=0x98
        | 0xac..=0xb1
        | 0xbe
        | 0xbf
        | 0xc2
        | 0xc3 => 1,
        // One-byte operand.
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => 2,
        // Two-byte operand: sipush, ldc_w/ldc2_w, iinc, branches,
        // field/method refs, type ops.
        0x11 | 0x13 | 0x14 | OP_IINC | 0x99..=0xa8 | 0xb2..=0xb8 | 0xbb | 0xbd | 0xc0 | 0xc1
        | 0xc6 | 0xc7 => 3,
        // multianewarray: pool index + dimension count.
        0xc5 => 4,
        // invokeinterface / invokedynamic / goto_w / jsr_w.
        0xb9 | 0xba | 0xc8 | 0xc9 => 5,
        OP_WIDE => {
            let modified = *code
                .get(pc + 1)
                .ok_or_else(|| Error::Malformed("truncated wide instruction".into()))?;
            if modified == OP_IINC { 6 } else { 4 }
        }
        OP_TABLESWITCH => {
            let pad = switch_padding(pc);
            let base = pc + 1 + pad;
            let low = read_i32(code, base + 4)?;
            let high = read_i32(code, base + 8)?;
            if high < low {
                return Err(Error::Malformed("tableswitch bounds inverted".into()));
            }
            // Case count can reach 2^32, so widen before the subtraction.
            let cases = i64::from(high) - i64::from(low) + 1;
            let table = usize::try_from(cases)
                .ok()
                .and_then(|c| c.checked_mul(4))
                .ok_or_else(|| Error::Malformed("oversized tableswitch".into()))?;
            1 + pad + 12 + table
        }
        OP_LOOKUPSWITCH => {
            let pad = switch_padding(pc);
            let base = pc + 1 + pad;
            let npairs = read_i32(code, base + 4)?;
            if npairs < 0 {
                return Err(Error::Malformed("negative lookupswitch pair count".into()));
            }
            1 + pad + 8 + npairs as usize * 8
        }
        other => {
            return Err(Error::Malformed(format!(
                "unknown opcode {other:#04x} at offset {pc}"
            )));
        }
    };
    if pc + len > code.len() {
        return Err(Error::Malformed(format!(
            "instruction at offset {pc} runs past end of code"
        )));
    }
    Ok(len)
}

/// Switch operands are padded so the default offset is 4-byte aligned
/// relative to the start of the code array.
fn switch_padding(pc: usize) -> usize {
    (4 - ((pc + 1) % 4)) % 4
}

fn read_i32(code: &[u8], at: usize) -> Result<i32> {
    let bytes: [u8; 4] = code
        .get(at..at + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| Error::Malformed("truncated switch instruction".into()))?;
    Ok(i32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_getstatic_and_putstatic_operands() {
        // getstatic #3, iconst_0, putstatic #3, return
        let mut code = vec![0xb2, 0x00, 0x03, 0x03, 0xb3, 0x00, 0x03, 0xb1];
        let mut seen = Vec::new();
        patch_static_field_ops(&mut code, |idx| {
            seen.push(idx);
            Ok(Some(0x0102))
        })
        .unwrap();
        assert_eq!(seen, vec![3, 3]);
        assert_eq!(code, vec![0xb2, 0x01, 0x02, 0x03, 0xb3, 0x01, 0x02, 0xb1]);
    }

    #[test]
    fn leaves_operands_alone_when_patch_declines() {
        let mut code = vec![0xb2, 0x00, 0x03, 0xb1];
        patch_static_field_ops(&mut code, |_| Ok(None)).unwrap();
        assert_eq!(code, vec![0xb2, 0x00, 0x03, 0xb1]);
    }

    #[test]
    fn walks_over_variable_length_instructions() {
        // tableswitch at pc 0: opcode + 3 pad + default + low(0) + high(0)
        // + one 4-byte offset, then getstatic #7, return.
        let mut code = vec![0xaa];
        code.extend_from_slice(&[0, 0, 0]); // padding to offset 4
        code.extend_from_slice(&20i32.to_be_bytes()); // default
        code.extend_from_slice(&0i32.to_be_bytes()); // low
        code.extend_from_slice(&0i32.to_be_bytes()); // high
        code.extend_from_slice(&20i32.to_be_bytes()); // jump offset
        code.extend_from_slice(&[0xb2, 0x00, 0x07, 0xb1]);

        let mut seen = Vec::new();
        patch_static_field_ops(&mut code, |idx| {
            seen.push(idx);
            Ok(None)
        })
        .unwrap();
        assert_eq!(seen, vec![7], "walker must step over the switch payload");
    }

    #[test]
    fn rejects_tableswitch_with_absurd_bounds() {
        // low = i32::MIN, high = 0: the case count does not fit i32.
        let mut code = vec![0xaa];
        code.extend_from_slice(&[0, 0, 0]); // padding to offset 4
        code.extend_from_slice(&16i32.to_be_bytes()); // default
        code.extend_from_slice(&i32::MIN.to_be_bytes()); // low
        code.extend_from_slice(&0i32.to_be_bytes()); // high

        assert!(patch_static_field_ops(&mut code, |_| Ok(None)).is_err());
    }

    #[test]
    fn rejects_unknown_opcodes() {
        let mut code = vec![0xf0];
        assert!(patch_static_field_ops(&mut code, |_| Ok(None)).is_err());
    }
}
