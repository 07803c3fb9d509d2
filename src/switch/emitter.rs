/*!
The comparison emitter: emits the cheapest correct branch for each comparison a strategy requests

# Encodings
Every comparison ends in one of two forms:
- the fused form, a single `cbcond` comparing and branching, which only reaches 512 instructions either
  way, cannot sit in a delay slot, and should not directly follow another `cbcond`;
- the verbose form, `cmp` followed by an annulled, predict-taken `bpcc` and a `nop` in its delay slot,
  which always reaches.

Simple keys are compared as immediates. Complex keys are first loaded into the scratch register, and
compared with the condition codes matching their width. The fused form is only chosen when the
estimated distance from where the branch *will* be, after materialization and any hazard padding, is
certain to be in reach.
*/
use super::key::{ComplexKey, Key};
use super::materialize::Materialization;
use super::reach::is_short_branch;
use super::strategy::SwitchClosure;
use crate::asm::{Annul, Assembler, BranchPredict, Hazard, Label};
use crate::ctx::EmitCtx;
use crate::error::Error;
use crate::target::{Condition, ConditionFlag, CpuFeature, Register, Width, CC, INSTRUCTION_SIZE};
use crate::util::is_simm5;

/// Emits the comparisons of one switch into a code generation context
#[derive(Debug)]
pub struct SwitchEmitter<'a> {
    /// The keys of the switch
    keys: &'a [Key],
    /// The target of each key
    key_targets: &'a [Label],
    /// The default target
    default_target: Label,
    /// The label bound directly after the switch, if known
    successor: Option<Label>,
    /// The register holding the switch value
    key: Register,
    /// The constant table base, or `%g0` if no key needs it
    constant_base: Register,
    /// The scratch register complex keys are loaded into
    scratch: Register,
    /// The width of the switch value, for comparisons against simple keys
    key_width: Width,
    /// The context code is emitted into
    ctx: &'a mut EmitCtx,
}

/// Where a fused branch would land after `plan`, or `None` if it would land in a delay slot
fn fused_branch_probe(asm: &Assembler, plan: &Materialization) -> Option<usize> {
    let hazard = if plan.is_empty() {
        asm.fused_branch_hazard()
    } else {
        Hazard::None
    };
    let probe = asm.position() + plan.size();
    match hazard {
        Hazard::None => Some(probe),
        Hazard::BackToBackFused => Some(probe + INSTRUCTION_SIZE),
        Hazard::DelaySlot => None,
    }
}

/// Emit the verbose tail of a comparison: an annulled, predict-taken branch and its delay slot
fn emit_branch(asm: &mut Assembler, cc: CC, cond: ConditionFlag, target: Label) {
    asm.bpcc(cc, cond, Annul::Annul, BranchPredict::PredictTaken, target);
    asm.nop();
}

impl<'a> SwitchEmitter<'a> {
    /// Create a new emitter. `constant_base` is `%g0` when no key needs the constant table.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        keys: &'a [Key],
        key_targets: &'a [Label],
        default_target: Label,
        successor: Option<Label>,
        key: Register,
        constant_base: Register,
        scratch: Register,
        key_width: Width,
        ctx: &'a mut EmitCtx,
    ) -> SwitchEmitter<'a> {
        SwitchEmitter {
            keys,
            key_targets,
            default_target,
            successor,
            key,
            constant_base,
            scratch,
            key_width,
            ctx,
        }
    }

    /// Compare against an immediate key
    fn emit_base_comparison(
        &mut self,
        index: usize,
        value: i32,
        condition: Condition,
        target: Label,
    ) {
        let cc = self.key_width.cc();
        let cond = ConditionFlag::from(condition);
        let ctx = &mut *self.ctx;
        let hint = ctx.asm.request_hint(target);
        let probe = fused_branch_probe(&ctx.asm, &Materialization::default());
        let fused = ctx.config.has_feature(CpuFeature::Cbcond)
            && is_simm5(value as i64)
            && probe.map_or(false, |probe| {
                is_short_branch(&ctx.asm, probe, &hint, target, &ctx.config)
            });
        tracing::trace!(index, value, ?condition, %target, fused, "simple key comparison");
        if fused {
            ctx.asm.cbcond(cond, cc, self.key, value, target);
        } else {
            ctx.asm.cmp(self.key, value);
            emit_branch(&mut ctx.asm, cc, cond, target);
        }
    }

    /// Load a constant-table key into the scratch register and compare against it
    fn emit_complex_comparison(
        &mut self,
        index: usize,
        key: ComplexKey,
        condition: Condition,
        target: Label,
    ) -> Result<(), Error> {
        let cc = key.width().cc();
        let cond = ConditionFlag::from(condition);
        let ctx = &mut *self.ctx;
        let hint = ctx.asm.request_hint(target);
        let plan = Materialization::plan(
            &Key::Complex(key),
            self.constant_base,
            self.scratch,
            &mut ctx.table,
        )?;
        let probe = fused_branch_probe(&ctx.asm, &plan);
        let fused = ctx.config.has_feature(CpuFeature::Cbcond)
            && probe.map_or(false, |probe| {
                is_short_branch(&ctx.asm, probe, &hint, target, &ctx.config)
            });
        tracing::trace!(
            index,
            key = ?key,
            ?condition,
            %target,
            load = plan.len(),
            fused,
            "complex key comparison"
        );
        plan.emit(&mut ctx.asm);
        if fused {
            ctx.asm.cbcond(cond, cc, self.key, self.scratch, target);
        } else {
            ctx.asm.cmp(self.key, self.scratch);
            emit_branch(&mut ctx.asm, cc, cond, target);
        }
        Ok(())
    }
}

impl<'a> SwitchClosure for SwitchEmitter<'a> {
    fn conditional_jump(
        &mut self,
        index: usize,
        condition: Condition,
        target: Label,
    ) -> Result<(), Error> {
        match self.keys.get(index) {
            Some(Key::Complex(key)) => {
                let key = *key;
                self.emit_complex_comparison(index, key, condition, target)
            }
            Some(Key::Simple(value)) => {
                let value = *value;
                self.emit_base_comparison(index, value, condition, target);
                Ok(())
            }
            None => Err(Error::KeyIndexOutOfBounds(index)),
        }
    }
    fn jump(&mut self, target: Label) -> Result<(), Error> {
        self.ctx.asm.jmp(target);
        Ok(())
    }
    fn bind(&mut self, label: Label) -> Result<(), Error> {
        self.ctx.asm.bind(label)
    }
    fn new_label(&mut self) -> Label {
        self.ctx.asm.new_local_label()
    }
    fn key_target(&self, index: usize) -> Result<Label, Error> {
        self.key_targets
            .get(index)
            .copied()
            .ok_or(Error::KeyIndexOutOfBounds(index))
    }
    fn default_target(&self) -> Label {
        self.default_target
    }
    fn is_successor(&self, label: Label) -> bool {
        self.successor == Some(label)
    }
}
