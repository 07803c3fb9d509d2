/*!
Instruction encoding and the final layout pass
*/
use super::{Annul, Assembler, BranchPredict, Inst, Label, Operand};
use crate::error::Error;
use crate::target::{Register, Width, CC, G0, INSTRUCTION_SIZE};
use crate::util::is_simm;

/// The encoding of `nop`, i.e. `sethi 0, %g0`
pub const NOP: u32 = 0x0100_0000;

/// Displacement bits of a conditional branch on integer condition codes, in instructions
pub const BPCC_DISP_BITS: u32 = 19;

/// Displacement bits of a fused compare-and-branch, in instructions
pub const CBCOND_DISP_BITS: u32 = 10;

const OP3_OR: u32 = 0x02;
const OP3_SUBCC: u32 = 0x14;
const OP3_LDUW: u32 = 0x00;
const OP3_LDX: u32 = 0x0b;

#[inline]
fn reg(r: Register) -> u32 {
    r.number() as u32
}

#[inline]
fn operand(rs2: Operand) -> u32 {
    match rs2 {
        Operand::Reg(r) => reg(r),
        Operand::Imm(imm) => (1 << 13) | (imm as u32 & 0x1fff),
    }
}

/// Encode a format 3 instruction
#[inline]
fn fmt3(op: u32, rd: Register, op3: u32, rs1: Register, rs2: Operand) -> u32 {
    (op << 30) | (reg(rd) << 25) | (op3 << 19) | (reg(rs1) << 14) | operand(rs2)
}

/// Compute the displacement of a branch in instructions, checking it fits in `bits` bits
fn displacement(at: usize, target: Label, position: usize, bits: u32) -> Result<i64, Error> {
    let bytes = position as isize - at as isize;
    let words = (bytes / INSTRUCTION_SIZE as isize) as i64;
    if is_simm(words, bits) {
        Ok(words)
    } else {
        Err(Error::BranchOutOfRange {
            at,
            target,
            displacement: bytes,
        })
    }
}

impl Inst {
    /**
    Encode this instruction at position `at`, resolving its branch target with `resolve`.

    Returns an error if the target is unbound or out of reach of the encoding.
    */
    pub fn encode<F>(&self, at: usize, resolve: F) -> Result<u32, Error>
    where
        F: Fn(Label) -> Option<usize>,
    {
        let word = match *self {
            Inst::Cmp { rs1, rs2 } => fmt3(2, G0, OP3_SUBCC, rs1, rs2),
            Inst::Or { rs1, rs2, rd } => fmt3(2, rd, OP3_OR, rs1, rs2),
            Inst::Load {
                width,
                base,
                offset,
                rd,
            } => {
                let op3 = match width {
                    Width::Word => OP3_LDUW,
                    Width::Xword => OP3_LDX,
                };
                fmt3(3, rd, op3, base, offset)
            }
            Inst::Sethi { imm22, rd } => (reg(rd) << 25) | (0b100 << 22) | (imm22 & 0x3f_ffff),
            Inst::Nop => NOP,
            Inst::Bpcc {
                cc,
                cond,
                annul,
                predict,
                target,
            } => {
                let position = resolve(target).ok_or(Error::UnboundLabel(target))?;
                let disp = displacement(at, target, position, BPCC_DISP_BITS)?;
                let a = (annul == Annul::Annul) as u32;
                let p = (predict == BranchPredict::PredictTaken) as u32;
                let cc = match cc {
                    CC::Icc => 0b00,
                    CC::Xcc => 0b10,
                };
                (a << 29)
                    | (cond.value() << 25)
                    | (0b001 << 22)
                    | (cc << 20)
                    | (p << 19)
                    | (disp as u32 & 0x7_ffff)
            }
            Inst::Cbcond {
                cond,
                cc,
                rs1,
                rs2,
                target,
            } => {
                let position = resolve(target).ok_or(Error::UnboundLabel(target))?;
                let disp = displacement(at, target, position, CBCOND_DISP_BITS)? as u32;
                let cond = cond.value();
                let rs2 = match rs2 {
                    Operand::Reg(r) => reg(r),
                    Operand::Imm(imm) => (1 << 13) | (imm as u32 & 0x1f),
                };
                ((cond >> 3) << 29)
                    | (1 << 28)
                    | ((cond & 0x7) << 25)
                    | (0b011 << 22)
                    | ((cc.is_xcc() as u32) << 21)
                    | (((disp >> 8) & 0x3) << 19)
                    | (reg(rs1) << 14)
                    | ((disp & 0xff) << 5)
                    | rs2
            }
        };
        Ok(word)
    }
}

impl Assembler {
    /**
    Lay out the emitted code, resolving every branch displacement.

    Returns the code as big-endian bytes. A branch whose label was never bound, or whose target is
    beyond the reach of its encoding, is an error: short encodings are never widened here.
    */
    pub fn finish(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::with_capacity(self.position());
        for (ix, inst) in self.code.iter().enumerate() {
            let at = ix * INSTRUCTION_SIZE;
            let word = inst.encode(at, |label| self.label_position(label))?;
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        tracing::debug!(
            instructions = self.code.len(),
            labels = self.labels.len(),
            "laid out code"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::ConditionFlag;

    fn words(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn arithmetic_encodings() {
        let none = |_: Label| -> Option<usize> { None };
        assert_eq!(Inst::Nop.encode(0, none).unwrap(), 0x0100_0000);
        // cmp %o0, %o1 == subcc %o0, %o1, %g0
        let cmp = Inst::Cmp {
            rs1: Register::o(0),
            rs2: Operand::Reg(Register::o(1)),
        };
        assert_eq!(cmp.encode(0, none).unwrap(), 0x80a2_0009);
        // cmp %o0, 5
        let cmp = Inst::Cmp {
            rs1: Register::o(0),
            rs2: Operand::Imm(5),
        };
        assert_eq!(cmp.encode(0, none).unwrap(), 0x80a2_2005);
        // cmp %o0, -1
        let cmp = Inst::Cmp {
            rs1: Register::o(0),
            rs2: Operand::Imm(-1),
        };
        assert_eq!(cmp.encode(0, none).unwrap(), 0x80a2_3fff);
        // ldx [%l0 + 8], %g1
        let ldx = Inst::Load {
            width: Width::Xword,
            base: Register::l(0),
            offset: Operand::Imm(8),
            rd: Register::g(1),
        };
        assert_eq!(ldx.encode(0, none).unwrap(), 0xc25c_2008);
        // sethi %hi(0x12345400), %g1
        let sethi = Inst::Sethi {
            imm22: 0x1234_5400 >> 10,
            rd: Register::g(1),
        };
        assert_eq!(sethi.encode(0, none).unwrap(), 0x0304_8d15);
        let or = Inst::Or {
            rs1: G0,
            rs2: Operand::Imm(1),
            rd: Register::g(1),
        };
        assert_eq!(or.encode(0, none).unwrap(), 0x8210_2001);
    }

    #[test]
    fn branch_encodings() {
        let mut asm = Assembler::new();
        let l = asm.new_label();
        asm.bpcc(
            CC::Xcc,
            ConditionFlag::Equal,
            Annul::Annul,
            BranchPredict::PredictTaken,
            l,
        );
        asm.nop();
        asm.cbcond(ConditionFlag::NotEqual, CC::Icc, Register::o(0), 3, l);
        asm.bind(l).unwrap();
        let code = words(&asm.finish().unwrap());
        // be,a,pt %xcc, +3 instructions
        assert_eq!(code[0], 0x2268_0003);
        assert_eq!(code[1], NOP);
        // cwbne %o0, 3, +1 instruction
        assert_eq!(code[2], 0x32c2_2023);
    }

    #[test]
    fn unbound_labels_are_rejected() {
        let mut asm = Assembler::new();
        let l = asm.new_label();
        asm.jmp(l);
        assert_eq!(asm.finish(), Err(Error::UnboundLabel(l)));
    }

    #[test]
    fn out_of_range_fused_branches_are_rejected() {
        let mut asm = Assembler::new();
        let l = asm.new_label();
        asm.cbcond(ConditionFlag::Equal, CC::Icc, Register::o(0), 0, l);
        for _ in 0..600 {
            asm.nop();
        }
        asm.bind(l).unwrap();
        assert_eq!(
            asm.finish(),
            Err(Error::BranchOutOfRange {
                at: 0,
                target: l,
                displacement: 601 * 4,
            })
        );
    }
}
