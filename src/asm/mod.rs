/*!
A minimal assembler for the delayed-branch target

# Overview
The [`Assembler`] appends fixed-size instructions to a buffer, tracking the emission cursor, the
labels bound so far and the [`LabelHint`]s requested by branches. Labels are bound to byte positions
but branch displacements are only resolved by [`Assembler::finish`], the layout pass.

Hints are what makes speculative short branches possible: a hint requested for a forward label in
one emission pass records the distance to that label once it is bound, and [`Assembler::reset`]
carries completed hints over to the next pass.
*/
use crate::error::Error;
use crate::quick_display;
use crate::target::{ConditionFlag, Register, Width, CC, G0, INSTRUCTION_SIZE};
use fxhash::FxHashMap;
use itertools::Itertools;

pub mod data;
pub mod encode;

/// A label in the code being emitted
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Label(u32);

quick_display!(Label, l, fmt => write!(fmt, "L{}", l.0));

impl Label {
    /// The index of this label in its assembler
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/**
A hint for the distance to a label.

A hint remembers the position at which it was first requested in an emission pass and, once the label
is bound in that pass, the position of the label. A hint carried over from a completed pass is valid,
and gives the distance the branch had in that pass.
*/
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct LabelHint {
    position: usize,
    target: Option<usize>,
}

impl LabelHint {
    /// The position at which this hint was requested
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }
    /// The position of the label, if it was bound
    #[inline]
    pub fn target(&self) -> Option<usize> {
        self.target
    }
    /// Whether this hint records a distance
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.target.is_some()
    }
    /// The recorded distance from the request to the label, in bytes
    #[inline]
    pub fn displacement(&self) -> Option<isize> {
        self.target
            .map(|target| target as isize - self.position as isize)
    }
}

/// The second operand of an arithmetic instruction
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Operand {
    /// A register operand
    Reg(Register),
    /// A signed immediate operand
    Imm(i32),
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Operand {
        Operand::Reg(reg)
    }
}

impl From<i32> for Operand {
    fn from(imm: i32) -> Operand {
        Operand::Imm(imm)
    }
}

quick_display!(Operand, o, fmt => match o {
    Operand::Reg(r) => write!(fmt, "{}", r),
    Operand::Imm(i) => write!(fmt, "{}", i),
});

/// Whether a conditional branch annuls its delay slot when not taken
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Annul {
    /// Annul the delay slot instruction if the branch is not taken
    Annul,
    /// Always execute the delay slot instruction
    NotAnnul,
}

/// Static branch prediction
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BranchPredict {
    /// The branch is predicted taken
    PredictTaken,
    /// The branch is predicted not taken
    PredictNotTaken,
}

/// An instruction of the target
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Inst {
    /// Compare `rs1` to `rs2`, setting both condition code sets (`subcc rs1, rs2, %g0`)
    Cmp {
        /// The first operand
        rs1: Register,
        /// The second operand
        rs2: Operand,
    },
    /// A conditional branch on integer condition codes, with a delay slot
    Bpcc {
        /// The condition codes tested
        cc: CC,
        /// The condition
        cond: ConditionFlag,
        /// Whether the delay slot is annulled
        annul: Annul,
        /// The static prediction
        predict: BranchPredict,
        /// The branch target
        target: Label,
    },
    /// A fused compare-and-branch, without a delay slot
    Cbcond {
        /// The condition
        cond: ConditionFlag,
        /// The condition codes compared
        cc: CC,
        /// The first operand
        rs1: Register,
        /// The second operand, a register or 5-bit immediate
        rs2: Operand,
        /// The branch target
        target: Label,
    },
    /// Set the high 22 bits of a register
    Sethi {
        /// The immediate, already shifted right by 10
        imm22: u32,
        /// The destination register
        rd: Register,
    },
    /// Bitwise or
    Or {
        /// The first operand
        rs1: Register,
        /// The second operand
        rs2: Operand,
        /// The destination register
        rd: Register,
    },
    /// A zero-extending load from memory
    Load {
        /// The width of the value loaded
        width: Width,
        /// The base address register
        base: Register,
        /// The offset from the base address
        offset: Operand,
        /// The destination register
        rd: Register,
    },
    /// No operation
    Nop,
}

impl Inst {
    /// `sethi %hi(value), rd`
    pub fn sethi(value: u32, rd: Register) -> Inst {
        Inst::Sethi {
            imm22: value >> 10,
            rd,
        }
    }
    /// `or rs1, rs2, rd`
    pub fn or<O: Into<Operand>>(rs1: Register, rs2: O, rd: Register) -> Inst {
        Inst::Or {
            rs1,
            rs2: rs2.into(),
            rd,
        }
    }
    /// A zero-extending load of `width` from `[base + offset]` into `rd`
    pub fn ld<O: Into<Operand>>(width: Width, base: Register, offset: O, rd: Register) -> Inst {
        Inst::Load {
            width,
            base,
            offset: offset.into(),
            rd,
        }
    }
    /// The branch target of this instruction, if any
    pub fn target(&self) -> Option<Label> {
        match self {
            Inst::Bpcc { target, .. } | Inst::Cbcond { target, .. } => Some(*target),
            _ => None,
        }
    }
    /// Whether this is a control transfer with a delay slot
    #[inline]
    pub fn is_delayed(&self) -> bool {
        match self {
            Inst::Bpcc { .. } => true,
            _ => false,
        }
    }
    /// Whether this is a fused compare-and-branch
    #[inline]
    pub fn is_cbcond(&self) -> bool {
        match self {
            Inst::Cbcond { .. } => true,
            _ => false,
        }
    }
}

quick_display!(Inst, inst, fmt => match inst {
    Inst::Cmp { rs1, rs2 } => write!(fmt, "cmp {}, {}", rs1, rs2),
    Inst::Bpcc { cc, cond, annul, predict, target } => {
        write!(fmt, "b{}", cond.mnemonic())?;
        if *annul == Annul::Annul {
            write!(fmt, ",a")?;
        }
        match predict {
            BranchPredict::PredictTaken => write!(fmt, ",pt")?,
            BranchPredict::PredictNotTaken => write!(fmt, ",pn")?,
        }
        write!(fmt, " {}, {}", cc, target)
    }
    Inst::Cbcond { cond, cc, rs1, rs2, target } => write!(
        fmt,
        "c{}b{} {}, {}, {}",
        if cc.is_xcc() { 'x' } else { 'w' },
        cond.mnemonic(),
        rs1,
        rs2,
        target
    ),
    Inst::Sethi { imm22, rd } => write!(fmt, "sethi {:#x}, {}", imm22, rd),
    Inst::Or { rs1, rs2, rd } => write!(fmt, "or {}, {}, {}", rs1, rs2, rd),
    Inst::Load { width, base, offset, rd } => write!(
        fmt,
        "{} [{} + {}], {}",
        match width {
            Width::Word => "lduw",
            Width::Xword => "ldx",
        },
        base,
        offset,
        rd
    ),
    Inst::Nop => write!(fmt, "nop"),
});

/// A pipeline hazard at the emission cursor, for a fused compare-and-branch
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Hazard {
    /// A fused branch may be emitted directly
    None,
    /// The previous instruction is a fused branch: a `nop` must separate the two
    BackToBackFused,
    /// The cursor is in the delay slot of a branch, where a fused branch is illegal
    DelaySlot,
}

/// An emission buffer for the target
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    /// The instructions emitted so far
    code: Vec<Inst>,
    /// The position of each label, if bound
    labels: Vec<Option<usize>>,
    /// The order in which labels were bound in this pass
    bind_log: Vec<Label>,
    /// Hints requested in this pass
    hints: FxHashMap<Label, LabelHint>,
    /// Valid hints carried over from the previous pass
    prior: FxHashMap<Label, LabelHint>,
    /// Labels handed out by [`Assembler::new_local_label`], in order of first request
    locals: Vec<Label>,
    /// The next local label to hand out in this pass
    next_local: usize,
}

/// A point in emission which an [`Assembler`] can be rolled back to
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Checkpoint {
    code: usize,
    labels: usize,
    binds: usize,
    locals: usize,
}

impl Assembler {
    /// Create a new, empty assembler
    pub fn new() -> Assembler {
        Assembler::default()
    }
    /// The current emission position, in bytes
    #[inline]
    pub fn position(&self) -> usize {
        self.code.len() * INSTRUCTION_SIZE
    }
    /// The instructions emitted so far
    #[inline]
    pub fn code(&self) -> &[Inst] {
        &self.code
    }
    /// Create a new, unbound label
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(None);
        label
    }
    /**
    Get a label local to the code being emitted.

    The `n`th local label requested in a pass is the same label in every pass, so hints requested for
    it carry over a [`reset`](Assembler::reset) like those of any other label.
    */
    pub fn new_local_label(&mut self) -> Label {
        let label = match self.locals.get(self.next_local) {
            Some(label) => *label,
            None => {
                let label = self.new_label();
                self.locals.push(label);
                label
            }
        };
        self.next_local += 1;
        label
    }
    /// The number of labels allocated so far
    #[inline]
    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }
    /// Get the position of a label, if bound
    #[inline]
    pub fn label_position(&self, label: Label) -> Option<usize> {
        self.labels.get(label.index()).copied().flatten()
    }
    /// Bind a label to the current position
    pub fn bind(&mut self, label: Label) -> Result<(), Error> {
        let position = self.position();
        let slot = self
            .labels
            .get_mut(label.index())
            .ok_or(Error::UnknownLabel(label))?;
        if slot.is_some() {
            return Err(Error::LabelAlreadyBound(label));
        }
        *slot = Some(position);
        self.bind_log.push(label);
        if let Some(hint) = self.hints.get_mut(&label) {
            hint.target = Some(position);
        }
        Ok(())
    }
    /**
    Request a distance hint for a label.

    Returns the hint carried over from the previous pass if there is one, and otherwise the (possibly
    invalid) hint of this pass. Only the first request for a label in a pass records a position.
    */
    pub fn request_hint(&mut self, label: Label) -> LabelHint {
        let position = self.position();
        let bound = self.label_position(label);
        let current = *self.hints.entry(label).or_insert(LabelHint {
            position,
            target: bound,
        });
        self.prior.get(&label).copied().unwrap_or(current)
    }
    /// Emit an instruction
    #[inline]
    pub fn emit(&mut self, inst: Inst) {
        self.code.push(inst)
    }
    /// The hazard a fused branch would face at the cursor
    pub fn fused_branch_hazard(&self) -> Hazard {
        match self.code.last() {
            Some(inst) if inst.is_delayed() => Hazard::DelaySlot,
            Some(inst) if inst.is_cbcond() => Hazard::BackToBackFused,
            _ => Hazard::None,
        }
    }
    /// Whether the cursor is in the delay slot of a branch
    #[inline]
    pub fn in_delay_slot(&self) -> bool {
        self.fused_branch_hazard() == Hazard::DelaySlot
    }
    /// Separate a fused branch from the previous one, if needed
    pub fn insert_nop_after_cbcond(&mut self) {
        if self.fused_branch_hazard() == Hazard::BackToBackFused {
            self.nop()
        }
    }
    /// Emit `cmp rs1, rs2`
    pub fn cmp<O: Into<Operand>>(&mut self, rs1: Register, rs2: O) {
        self.emit(Inst::Cmp {
            rs1,
            rs2: rs2.into(),
        })
    }
    /// Emit a conditional branch on integer condition codes. The caller fills the delay slot.
    pub fn bpcc(
        &mut self,
        cc: CC,
        cond: ConditionFlag,
        annul: Annul,
        predict: BranchPredict,
        target: Label,
    ) {
        self.emit(Inst::Bpcc {
            cc,
            cond,
            annul,
            predict,
            target,
        })
    }
    /// Emit a fused compare-and-branch, separating it from a preceding one if needed
    pub fn cbcond<O: Into<Operand>>(
        &mut self,
        cond: ConditionFlag,
        cc: CC,
        rs1: Register,
        rs2: O,
        target: Label,
    ) {
        debug_assert!(!self.in_delay_slot(), "fused branch in a delay slot");
        self.insert_nop_after_cbcond();
        self.emit(Inst::Cbcond {
            cond,
            cc,
            rs1,
            rs2: rs2.into(),
            target,
        })
    }
    /// Emit an unconditional branch followed by a `nop` in its delay slot
    pub fn jmp(&mut self, target: Label) {
        self.bpcc(
            CC::Icc,
            ConditionFlag::Always,
            Annul::NotAnnul,
            BranchPredict::PredictTaken,
            target,
        );
        self.nop();
    }
    /// Emit a `nop`
    #[inline]
    pub fn nop(&mut self) {
        self.emit(Inst::Nop)
    }
    /// Record the current state of this assembler
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            code: self.code.len(),
            labels: self.labels.len(),
            binds: self.bind_log.len(),
            locals: self.next_local,
        }
    }
    /// Undo everything emitted, created or bound since a checkpoint
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.code.truncate(checkpoint.code);
        for label in self.bind_log.drain(checkpoint.binds..) {
            if let Some(slot) = self.labels.get_mut(label.index()) {
                *slot = None;
            }
            if let Some(hint) = self.hints.get_mut(&label) {
                hint.target = None;
            }
        }
        self.labels.truncate(checkpoint.labels);
        let labels = checkpoint.labels;
        self.hints.retain(|label, _| label.index() < labels);
        self.prior.retain(|label, _| label.index() < labels);
        self.locals.retain(|label| label.index() < labels);
        self.next_local = checkpoint.locals.min(self.locals.len());
    }
    /**
    Start a new emission pass over the same labels.

    All code is discarded, all labels unbound and local labels handed out again from the first. Hints
    whose label was bound in the finished pass are kept, so the next pass can use the distances
    measured in this one. Since a pass only ever replaces
    verbose branches by shorter fused ones, distances in the next pass are no larger than in this one.
    */
    pub fn reset(&mut self) {
        self.code.clear();
        self.bind_log.clear();
        self.next_local = 0;
        for slot in self.labels.iter_mut() {
            *slot = None;
        }
        for (label, hint) in self.hints.drain() {
            if hint.is_valid() {
                self.prior.insert(label, hint);
            }
        }
    }
    /// A textual listing of the code emitted so far, with bound labels
    pub fn listing(&self) -> String {
        let mut starts: FxHashMap<usize, Vec<Label>> = FxHashMap::default();
        for (ix, position) in self.labels.iter().enumerate() {
            if let Some(position) = position {
                starts.entry(*position).or_default().push(Label(ix as u32));
            }
        }
        let end = self.position();
        (0..=self.code.len())
            .flat_map(|ix| {
                let position = ix * INSTRUCTION_SIZE;
                let mut lines: Vec<String> = starts
                    .get(&position)
                    .into_iter()
                    .flatten()
                    .sorted()
                    .map(|label| format!("{}:", label))
                    .collect();
                if position < end {
                    lines.push(format!("    {}", self.code[ix]));
                }
                lines
            })
            .join("\n")
    }
    /// Whether any instruction so far uses `reg` as a base or operand register other than `%g0`
    pub fn uses_register(&self, reg: Register) -> bool {
        debug_assert!(reg != G0);
        self.code.iter().any(|inst| match *inst {
            Inst::Cmp { rs1, rs2 } | Inst::Cbcond { rs1, rs2, .. } => {
                rs1 == reg || rs2 == Operand::Reg(reg)
            }
            Inst::Or { rs1, rs2, rd } => rs1 == reg || rd == reg || rs2 == Operand::Reg(reg),
            Inst::Load {
                base, offset, rd, ..
            } => base == reg || rd == reg || offset == Operand::Reg(reg),
            Inst::Sethi { rd, .. } => rd == reg,
            Inst::Bpcc { .. } | Inst::Nop => false,
        })
    }
}
