/*!
The switch operation: a validated switch, ready to be emitted any number of times
*/
use super::emitter::SwitchEmitter;
use super::key::Key;
use super::size::{SizeCounter, SizeEstimate};
use super::strategy::SwitchStrategy;
use crate::asm::Label;
use crate::ctx::EmitCtx;
use crate::error::Error;
use crate::target::{Register, Width, G0};
use crate::util::is_simm13;

/**
A switch over the value in a register, lowered by a [`SwitchStrategy`].

All inputs are validated on construction, so emission can only fail on layout problems: a
[`SwitchOp`] which was built successfully always has one target per key, simple keys which fit a
compare immediate, a usable scratch register and, if any key lives in the constant table, a constant
table base.
*/
#[derive(Debug, Clone)]
pub struct SwitchOp<S> {
    /// The constant table base, if any
    constant_table_base: Option<Register>,
    /// The strategy deciding which comparisons to emit
    strategy: S,
    /// The target of each key
    key_targets: Vec<Label>,
    /// The default target
    default_target: Label,
    /// The label bound directly after the switch, if known
    fallthrough: Option<Label>,
    /// The register holding the switch value
    key: Register,
    /// The register complex keys are loaded into
    scratch: Register,
    /// The width of the switch value
    key_width: Width,
}

impl<S: SwitchStrategy> SwitchOp<S> {
    /**
    Create a new switch operation.

    A constant table base of `%g0` is treated as no base at all.
    */
    pub fn new(
        constant_table_base: Option<Register>,
        strategy: S,
        key_targets: Vec<Label>,
        default_target: Label,
        key: Register,
        scratch: Register,
        key_width: Width,
    ) -> Result<SwitchOp<S>, Error> {
        let keys = strategy.keys();
        if keys.is_empty() {
            return Err(Error::EmptySwitch);
        }
        if keys.len() != key_targets.len() {
            return Err(Error::TargetCountMismatch {
                keys: keys.len(),
                targets: key_targets.len(),
            });
        }
        for key in keys {
            if let Key::Simple(value) = *key {
                if !is_simm13(value as i64) {
                    return Err(Error::SimpleKeyOutOfRange(value as i64));
                }
            }
        }
        if scratch.is_zero() {
            return Err(Error::InvalidScratch);
        }
        if scratch == key {
            return Err(Error::ScratchIsKey);
        }
        let constant_table_base = constant_table_base.filter(|base| !base.is_zero());
        if constant_table_base.is_none() && keys.iter().any(Key::is_complex) {
            return Err(Error::MissingConstantTableBase);
        }
        Ok(SwitchOp {
            constant_table_base,
            strategy,
            key_targets,
            default_target,
            fallthrough: None,
            key,
            scratch,
            key_width,
        })
    }
    /// Declare the label bound directly after this switch, letting final tests fall through to it
    pub fn with_fallthrough(mut self, label: Label) -> SwitchOp<S> {
        self.fallthrough = Some(label);
        self
    }
    /// The keys of this switch
    #[inline]
    pub fn keys(&self) -> &[Key] {
        self.strategy.keys()
    }
    /// The strategy lowering this switch
    #[inline]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }
    /// The target of each key
    #[inline]
    pub fn key_targets(&self) -> &[Label] {
        &self.key_targets
    }
    /// The default target
    #[inline]
    pub fn default_target(&self) -> Label {
        self.default_target
    }
    /// The constant table base, if any
    #[inline]
    pub fn constant_table_base(&self) -> Option<Register> {
        self.constant_table_base
    }
    /**
    Estimate the code and constant-table size of this switch, by running its strategy without emitting.

    The estimate is the exact size of the switch emitted without fused branches into an empty
    constant table, and an upper bound otherwise.
    */
    pub fn estimate_size(&self) -> Result<SizeEstimate, Error> {
        let mut counter = SizeCounter::new(
            self.keys(),
            &self.key_targets,
            self.default_target,
            self.fallthrough,
        );
        self.strategy.run(&mut counter)?;
        Ok(counter.estimate())
    }
    /**
    Emit this switch into a context.

    On error, everything emitted for this switch is rolled back, leaving the context as it was.
    */
    #[tracing::instrument(level = "debug", skip(self, ctx), fields(keys = self.key_targets.len(), key = %self.key))]
    pub fn emit_code(&self, ctx: &mut EmitCtx) -> Result<(), Error> {
        let base = self.constant_table_base.unwrap_or(G0);
        let checkpoint = ctx.checkpoint();
        let start = ctx.asm.position();
        let mut emitter = SwitchEmitter::new(
            self.keys(),
            &self.key_targets,
            self.default_target,
            self.fallthrough,
            self.key,
            base,
            self.scratch,
            self.key_width,
            ctx,
        );
        match self.strategy.run(&mut emitter) {
            Ok(()) => {
                tracing::debug!(bytes = ctx.asm.position() - start, "emitted switch");
                Ok(())
            }
            Err(err) => {
                tracing::debug!(%err, "switch emission failed, rolling back");
                ctx.rollback(checkpoint);
                Err(err)
            }
        }
    }
}
