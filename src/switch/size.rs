/*!
Size estimation, used to price switch strategies against each other

A switch is priced by running its strategy against a [`SizeCounter`], which counts every comparison
and jump the strategy requests instead of emitting them. Each comparison is priced in its verbose
form, so an estimate is exactly the size of a switch emitted without fused branches into an empty
constant table, and an upper bound on the size of any other emission of it.
*/
use super::key::{Key, KeyKind};
use super::strategy::SwitchClosure;
use crate::asm::data::ConstantTable;
use crate::asm::{Assembler, Label};
use crate::error::Error;
use crate::target::{Condition, INSTRUCTION_SIZE};
use crate::util::is_simm13;
use std::iter::Sum;
use std::ops::Add;

/// The instructions of a verbose comparison: compare, branch and delay slot
pub const VERBOSE_COMPARISON_LEN: usize = 3;

/// The instructions of an unconditional jump: branch and delay slot
pub const JUMP_LEN: usize = 2;

/// The instructions needed to build a constant-table offset too large for an immediate
pub const FAR_OFFSET_LEN: usize = 2;

/// An estimate of the code and data a switch will need
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct SizeEstimate {
    /// Bytes of instructions
    pub instruction_bytes: usize,
    /// Bytes of constants embedded in the constant table
    pub constant_bytes: usize,
}

impl SizeEstimate {
    /// Create a new size estimate
    pub fn new(instruction_bytes: usize, constant_bytes: usize) -> SizeEstimate {
        SizeEstimate {
            instruction_bytes,
            constant_bytes,
        }
    }
    /// The total size, in bytes
    #[inline]
    pub fn total(&self) -> usize {
        self.instruction_bytes + self.constant_bytes
    }
}

impl Add for SizeEstimate {
    type Output = SizeEstimate;
    fn add(self, other: SizeEstimate) -> SizeEstimate {
        SizeEstimate {
            instruction_bytes: self.instruction_bytes + other.instruction_bytes,
            constant_bytes: self.constant_bytes + other.constant_bytes,
        }
    }
}

impl Sum for SizeEstimate {
    fn sum<I: Iterator<Item = SizeEstimate>>(iter: I) -> SizeEstimate {
        iter.fold(SizeEstimate::default(), Add::add)
    }
}

/// The base estimate of the constant-table bytes a key needs: none for an immediate
pub fn default_embedded_size(key: &Key) -> usize {
    match key {
        Key::Simple(_) => 0,
        Key::Complex(c) => c.width().bytes(),
    }
}

/// The constant-table bytes a key needs, as loaded by the comparison emitter
pub fn estimate_embedded_size(key: &Key) -> usize {
    match key.kind() {
        KeyKind::ComplexNarrow => 4,
        KeyKind::ComplexFull => 8,
        _ => default_embedded_size(key),
    }
}

/**
The price of one verbose comparison against `key`, loaded from a near constant-table slot.

Ignores alignment and sharing of constant-table slots, which only a [`SizeCounter`] can see.
*/
pub fn estimate_comparison_size(key: &Key) -> SizeEstimate {
    let load = if key.is_complex() { 1 } else { 0 };
    SizeEstimate {
        instruction_bytes: (load + VERBOSE_COMPARISON_LEN) * INSTRUCTION_SIZE,
        constant_bytes: estimate_embedded_size(key),
    }
}

/// A switch closure which counts the code a strategy would emit
#[derive(Debug)]
pub struct SizeCounter<'a> {
    /// The keys of the switch
    keys: &'a [Key],
    /// The target of each key
    key_targets: &'a [Label],
    /// The default target
    default_target: Label,
    /// The label bound directly after the switch, if known
    successor: Option<Label>,
    /// Hands out labels local to the dry run
    labels: Assembler,
    /// The constant table the switch would fill
    table: ConstantTable,
    /// Instruction bytes counted so far
    instruction_bytes: usize,
}

impl<'a> SizeCounter<'a> {
    /// Create a new counter for a switch
    pub fn new(
        keys: &'a [Key],
        key_targets: &'a [Label],
        default_target: Label,
        successor: Option<Label>,
    ) -> SizeCounter<'a> {
        SizeCounter {
            keys,
            key_targets,
            default_target,
            successor,
            labels: Assembler::new(),
            table: ConstantTable::new(),
            instruction_bytes: 0,
        }
    }
    /// The size counted so far
    pub fn estimate(&self) -> SizeEstimate {
        SizeEstimate {
            instruction_bytes: self.instruction_bytes,
            constant_bytes: self.table.len(),
        }
    }
}

impl<'a> SwitchClosure for SizeCounter<'a> {
    fn conditional_jump(
        &mut self,
        index: usize,
        _condition: Condition,
        _target: Label,
    ) -> Result<(), Error> {
        let key = self
            .keys
            .get(index)
            .ok_or(Error::KeyIndexOutOfBounds(index))?;
        self.instruction_bytes += estimate_comparison_size(key).instruction_bytes;
        if let Key::Complex(c) = key {
            let offset = self.table.reserve(c.bits(), c.width());
            if !is_simm13(offset as i64) {
                self.instruction_bytes += FAR_OFFSET_LEN * INSTRUCTION_SIZE;
            }
        }
        Ok(())
    }
    fn jump(&mut self, _target: Label) -> Result<(), Error> {
        self.instruction_bytes += JUMP_LEN * INSTRUCTION_SIZE;
        Ok(())
    }
    fn bind(&mut self, _label: Label) -> Result<(), Error> {
        Ok(())
    }
    fn new_label(&mut self) -> Label {
        self.labels.new_label()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switch::strategy::{BinaryStrategy, SequentialStrategy, SwitchStrategy};
    use pretty_assertions::assert_eq;

    fn count<S: SwitchStrategy>(strategy: &S, successor: bool) -> SizeEstimate {
        let mut asm = Assembler::new();
        let targets: Vec<Label> = strategy.keys().iter().map(|_| asm.new_label()).collect();
        let default = asm.new_label();
        let successor = if successor { Some(default) } else { None };
        let mut counter = SizeCounter::new(strategy.keys(), &targets, default, successor);
        strategy.run(&mut counter).unwrap();
        counter.estimate()
    }

    #[test]
    fn embedded_sizes_follow_key_width() {
        assert_eq!(estimate_embedded_size(&Key::Simple(100)), 0);
        assert_eq!(estimate_embedded_size(&Key::narrow(100)), 4);
        assert_eq!(estimate_embedded_size(&Key::full(100)), 8);
        for key in &[Key::Simple(1), Key::narrow(1), Key::full(1)] {
            assert_eq!(estimate_embedded_size(key), default_embedded_size(key));
        }
    }

    #[test]
    fn comparisons_are_priced_in_their_verbose_form() {
        assert_eq!(
            estimate_comparison_size(&Key::Simple(3)),
            SizeEstimate::new(12, 0)
        );
        assert_eq!(
            estimate_comparison_size(&Key::narrow(3)),
            SizeEstimate::new(16, 4)
        );
        assert_eq!(
            estimate_comparison_size(&Key::full(3)),
            SizeEstimate::new(16, 8)
        );
    }

    #[test]
    fn sequential_estimates_add_up_per_key() {
        let keys = vec![Key::Simple(1), Key::narrow(2), Key::full(3), Key::Simple(4)];
        let strategy = SequentialStrategy::in_order(keys.clone()).unwrap();
        let per_key: SizeEstimate = keys.iter().map(estimate_comparison_size).sum();
        let jump = JUMP_LEN * INSTRUCTION_SIZE;
        assert_eq!(
            count(&strategy, false).instruction_bytes,
            per_key.instruction_bytes + jump
        );
        assert_eq!(count(&strategy, true).instruction_bytes, per_key.instruction_bytes);
    }

    #[test]
    fn constants_are_counted_with_alignment_and_sharing() {
        // The full key is aligned to 8 bytes after the narrow one
        let strategy = SequentialStrategy::in_order(vec![Key::narrow(1), Key::full(2)]).unwrap();
        assert_eq!(count(&strategy, true).constant_bytes, 16);
        // Binary search compares each split key twice, but loads it from the same slot
        let keys: Vec<Key> = (0..8).map(Key::full).collect();
        let strategy = BinaryStrategy::new(keys).unwrap();
        assert_eq!(count(&strategy, false).constant_bytes, 64);
    }

    #[test]
    fn strategies_are_priced_by_what_they_emit() {
        let keys: Vec<Key> = (0..16).map(Key::Simple).collect();
        let sequential = count(&SequentialStrategy::in_order(keys.clone()).unwrap(), false);
        let binary = count(&BinaryStrategy::new(keys).unwrap(), false);
        assert_eq!(sequential, SizeEstimate::new(16 * 12 + 8, 0));
        assert!(binary.instruction_bytes > sequential.instruction_bytes);
    }
}
