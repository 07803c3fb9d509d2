/*!
Materializing switch keys into a scratch register

Materialization is planned before it is emitted, so the comparison emitter knows exactly how far the
emission cursor will move before it probes the distance to a branch target.
*/
use crate::asm::data::ConstantTable;
use crate::asm::{Assembler, Inst};
use crate::error::Error;
use crate::switch::key::{ComplexKey, Key};
use crate::target::{Register, INSTRUCTION_SIZE};
use crate::util::is_simm13;
use smallvec::SmallVec;

/// The most instructions a materialization can take
pub const MAX_MATERIALIZATION_LEN: usize = 3;

/// A planned sequence of instructions leaving a key in a register
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Materialization {
    insts: SmallVec<[Inst; MAX_MATERIALIZATION_LEN]>,
}

impl Materialization {
    /**
    Plan the materialization of a key into `scratch`.

    Simple keys are compared as immediates and need no instructions. Complex keys are reserved in the
    constant table and loaded from `[base + offset]`; an offset too large for an immediate is first
    built in `scratch`.
    */
    pub fn plan(
        key: &Key,
        base: Register,
        scratch: Register,
        table: &mut ConstantTable,
    ) -> Result<Materialization, Error> {
        match key {
            Key::Simple(_) => Ok(Materialization::default()),
            Key::Complex(key) => Self::plan_load(key, base, scratch, table),
        }
    }

    fn plan_load(
        key: &ComplexKey,
        base: Register,
        scratch: Register,
        table: &mut ConstantTable,
    ) -> Result<Materialization, Error> {
        if base.is_zero() {
            return Err(Error::MissingConstantTableBase);
        }
        let width = key.width();
        let offset = table.reserve(key.bits(), width);
        let mut insts: SmallVec<[Inst; MAX_MATERIALIZATION_LEN]> = SmallVec::new();
        if is_simm13(offset as i64) {
            insts.push(Inst::ld(width, base, offset as i32, scratch));
        } else {
            let offset = offset as u32;
            insts.push(Inst::sethi(offset, scratch));
            insts.push(Inst::or(scratch, (offset & 0x3ff) as i32, scratch));
            insts.push(Inst::ld(width, base, scratch, scratch));
        }
        tracing::trace!(key = ?key, offset, len = insts.len(), "planned constant load");
        Ok(Materialization { insts })
    }
    /// The number of instructions in this materialization
    #[inline]
    pub fn len(&self) -> usize {
        self.insts.len()
    }
    /// Whether this materialization emits nothing
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }
    /// The size of this materialization, in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.len() * INSTRUCTION_SIZE
    }
    /// The planned instructions
    #[inline]
    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }
    /// Emit the planned instructions
    pub fn emit(self, asm: &mut Assembler) {
        for inst in self.insts {
            asm.emit(inst)
        }
    }
}
