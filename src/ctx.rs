/*!
The code generation context for one compilation
*/
use crate::asm::data::{ConstantTable, TableCheckpoint};
use crate::asm::{self, Assembler};
use crate::error::Error;
use crate::target::TargetConfig;

/// A code generation context: an assembler, its constant table and the target it emits for
#[derive(Debug, Clone, Default)]
pub struct EmitCtx {
    /// The assembler code is emitted into
    pub asm: Assembler,
    /// The constant table of the code being emitted
    pub table: ConstantTable,
    /// The target configuration
    pub config: TargetConfig,
}

/// A point an [`EmitCtx`] can be rolled back to
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Checkpoint {
    asm: asm::Checkpoint,
    table: TableCheckpoint,
}

/// Laid-out code and its constant table
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Compiled {
    /// The machine code, as big-endian words
    pub code: Vec<u8>,
    /// The constant table
    pub data: Vec<u8>,
}

impl EmitCtx {
    /// Create a new, empty context for a given target
    pub fn new(config: TargetConfig) -> EmitCtx {
        EmitCtx {
            asm: Assembler::new(),
            table: ConstantTable::new(),
            config,
        }
    }
    /// Record the current state of this context
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            asm: self.asm.checkpoint(),
            table: self.table.checkpoint(),
        }
    }
    /// Undo everything emitted since a checkpoint
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.asm.rollback(checkpoint.asm);
        self.table.rollback(checkpoint.table);
    }
    /// Start a new emission pass, keeping label hints from the previous one
    pub fn reset(&mut self) {
        self.asm.reset();
        self.table.clear();
    }
    /// Lay out the emitted code
    pub fn finish(&self) -> Result<Compiled, Error> {
        Ok(Compiled {
            code: self.asm.finish()?,
            data: self.table.bytes().to_vec(),
        })
    }
}
