/*!
Switch strategies: the decision procedures deciding which comparisons to emit, and in what order

A strategy never emits code itself. It drives a [`SwitchClosure`], which emits one comparison per call
in exactly the order requested. Choosing *which* strategy to use for a given switch is left to the
caller.
*/
use super::key::{Key, KeyKind};
use crate::asm::Label;
use crate::error::Error;
use crate::target::Condition;
use fxhash::FxHashSet;
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::Debug;

/// The emission side of a switch, driven by a [`SwitchStrategy`]
pub trait SwitchClosure {
    /// Emit a branch to `target` taken if the switch value compares to key `index` by `condition`
    fn conditional_jump(
        &mut self,
        index: usize,
        condition: Condition,
        target: Label,
    ) -> Result<(), Error>;
    /// Emit an unconditional jump
    fn jump(&mut self, target: Label) -> Result<(), Error>;
    /// Bind a label created with [`new_label`](SwitchClosure::new_label) at the current position
    fn bind(&mut self, label: Label) -> Result<(), Error>;
    /// Create a label local to the switch
    fn new_label(&mut self) -> Label;
    /// Get the target of key `index`
    fn key_target(&self, index: usize) -> Result<Label, Error>;
    /// Get the default target
    fn default_target(&self) -> Label;
    /// Whether `label` is bound directly after the switch, so that control can fall through to it
    fn is_successor(&self, _label: Label) -> bool {
        false
    }
    /// Emit a branch to the target of key `index`, taken if the switch value compares to it by `condition`
    fn conditional_jump_to_key(&mut self, index: usize, condition: Condition) -> Result<(), Error> {
        let target = self.key_target(index)?;
        self.conditional_jump(index, condition, target)
    }
    /**
    Emit a final test against key `index`, going to the default target if it fails.

    If control may fall through to the default target, only the test is emitted; if it may fall
    through to the key target, the test is inverted. Otherwise the test is followed by a jump to the
    default target.
    */
    fn conditional_jump_or_default(
        &mut self,
        index: usize,
        condition: Condition,
        can_fall_through: bool,
    ) -> Result<(), Error> {
        let target = self.key_target(index)?;
        let default = self.default_target();
        if can_fall_through && self.is_successor(default) {
            self.conditional_jump(index, condition, target)
        } else if can_fall_through && self.is_successor(target) {
            self.conditional_jump(index, condition.negate(), default)
        } else {
            self.conditional_jump(index, condition, target)?;
            self.jump(default)
        }
    }
}

/// A decision procedure for a switch
pub trait SwitchStrategy: Debug {
    /// The keys of this switch, in the order of their targets
    fn keys(&self) -> &[Key];
    /// Drive a closure through the comparisons of this switch, ending with the default jump
    fn run(&self, closure: &mut dyn SwitchClosure) -> Result<(), Error>;
}

/// Check a set of keys is non-empty and free of duplicates
fn check_keys(keys: &[Key]) -> Result<(), Error> {
    if keys.is_empty() {
        return Err(Error::EmptySwitch);
    }
    let mut seen = FxHashSet::default();
    for (ix, key) in keys.iter().enumerate() {
        if !seen.insert(*key) {
            return Err(Error::DuplicateKey(ix));
        }
    }
    Ok(())
}

/// Test each key in turn, most probable first
#[derive(Debug, Clone, PartialEq)]
pub struct SequentialStrategy {
    keys: Vec<Key>,
    order: Vec<usize>,
}

impl SequentialStrategy {
    /// Create a sequential strategy testing keys by descending probability
    pub fn new(keys: Vec<Key>, probabilities: &[f64]) -> Result<SequentialStrategy, Error> {
        check_keys(&keys)?;
        if probabilities.len() != keys.len() {
            return Err(Error::ProbabilityCountMismatch {
                keys: keys.len(),
                probabilities: probabilities.len(),
            });
        }
        let order = (0..keys.len())
            .sorted_by(|&l, &r| {
                probabilities[r]
                    .partial_cmp(&probabilities[l])
                    .unwrap_or(Ordering::Equal)
            })
            .collect();
        Ok(SequentialStrategy { keys, order })
    }
    /// Create a sequential strategy testing keys in the order given
    pub fn in_order(keys: Vec<Key>) -> Result<SequentialStrategy, Error> {
        check_keys(&keys)?;
        let order = (0..keys.len()).collect();
        Ok(SequentialStrategy { keys, order })
    }
    /// The order in which keys are tested
    pub fn order(&self) -> &[usize] {
        &self.order
    }
}

impl SwitchStrategy for SequentialStrategy {
    fn keys(&self) -> &[Key] {
        &self.keys
    }
    fn run(&self, closure: &mut dyn SwitchClosure) -> Result<(), Error> {
        let (last, rest) = self.order.split_last().ok_or(Error::EmptySwitch)?;
        for &ix in rest {
            closure.conditional_jump_to_key(ix, Condition::Eq)?;
        }
        closure.conditional_jump_or_default(*last, Condition::Eq, true)
    }
}

/// Ranges of at most this many keys are tested sequentially by a [`BinaryStrategy`]
pub const BINARY_LEAF_SIZE: usize = 3;

/// Binary search over keys sorted by value
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryStrategy {
    keys: Vec<Key>,
    sorted: Vec<usize>,
    signed: bool,
}

impl BinaryStrategy {
    /**
    Create a binary strategy.

    Simple keys are ordered as signed integers and complex keys as unsigned ones, so all keys must be
    of the same kind.
    */
    pub fn new(keys: Vec<Key>) -> Result<BinaryStrategy, Error> {
        check_keys(&keys)?;
        let kind = keys[0].kind();
        if keys.iter().any(|key| key.kind() != kind) {
            return Err(Error::IncomparableKeys);
        }
        let sorted = (0..keys.len()).sorted_by_key(|&ix| keys[ix].ordinal()).collect();
        Ok(BinaryStrategy {
            keys,
            sorted,
            signed: kind == KeyKind::Simple,
        })
    }
    /// Key indices in ascending order of value
    pub fn sorted(&self) -> &[usize] {
        &self.sorted
    }

    fn search(&self, closure: &mut dyn SwitchClosure, lo: usize, hi: usize) -> Result<(), Error> {
        if hi - lo < BINARY_LEAF_SIZE {
            for &ix in &self.sorted[lo..hi] {
                closure.conditional_jump_to_key(ix, Condition::Eq)?;
            }
            return closure.conditional_jump_or_default(self.sorted[hi], Condition::Eq, false);
        }
        let mid = lo + (hi - lo) / 2;
        let upper = closure.new_label();
        let greater = if self.signed {
            Condition::Gt
        } else {
            Condition::At
        };
        closure.conditional_jump(self.sorted[mid], greater, upper)?;
        self.search(closure, lo, mid)?;
        closure.bind(upper)?;
        self.search(closure, mid + 1, hi)
    }
}

impl SwitchStrategy for BinaryStrategy {
    fn keys(&self) -> &[Key] {
        &self.keys
    }
    fn run(&self, closure: &mut dyn SwitchClosure) -> Result<(), Error> {
        self.search(closure, 0, self.keys.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::Assembler;
    use pretty_assertions::assert_eq;

    /// Records the calls made by a strategy
    #[derive(Debug)]
    struct Recorder {
        asm: Assembler,
        targets: Vec<Label>,
        default: Label,
        successor: Option<Label>,
        calls: Vec<String>,
    }

    impl Recorder {
        fn new(keys: usize) -> Recorder {
            let mut asm = Assembler::new();
            let targets = (0..keys).map(|_| asm.new_label()).collect();
            let default = asm.new_label();
            Recorder {
                asm,
                targets,
                default,
                successor: None,
                calls: Vec::new(),
            }
        }
    }

    impl SwitchClosure for Recorder {
        fn conditional_jump(
            &mut self,
            index: usize,
            condition: Condition,
            target: Label,
        ) -> Result<(), Error> {
            self.calls
                .push(format!("{:?} #{} -> {}", condition, index, target));
            Ok(())
        }
        fn jump(&mut self, target: Label) -> Result<(), Error> {
            self.calls.push(format!("jump {}", target));
            Ok(())
        }
        fn bind(&mut self, label: Label) -> Result<(), Error> {
            self.calls.push(format!("{}:", label));
            self.asm.bind(label)
        }
        fn new_label(&mut self) -> Label {
            self.asm.new_label()
        }
        fn key_target(&self, index: usize) -> Result<Label, Error> {
            self.targets
                .get(index)
                .copied()
                .ok_or(Error::KeyIndexOutOfBounds(index))
        }
        fn default_target(&self) -> Label {
            self.default
        }
        fn is_successor(&self, label: Label) -> bool {
            self.successor == Some(label)
        }
    }

    fn simple_keys(values: &[i32]) -> Vec<Key> {
        values.iter().map(|&v| Key::Simple(v)).collect()
    }

    #[test]
    fn sequential_tests_most_probable_first() {
        let strategy =
            SequentialStrategy::new(simple_keys(&[1, 2, 3]), &[0.1, 0.6, 0.3]).unwrap();
        assert_eq!(strategy.order(), &[1, 2, 0]);
        let mut recorder = Recorder::new(3);
        strategy.run(&mut recorder).unwrap();
        assert_eq!(
            recorder.calls,
            vec!["Eq #1 -> L1", "Eq #2 -> L2", "Eq #0 -> L0", "jump L3"]
        );
    }

    #[test]
    fn sequential_falls_through_when_it_can() {
        let strategy = SequentialStrategy::in_order(simple_keys(&[5, 6])).unwrap();
        let mut recorder = Recorder::new(2);
        recorder.successor = Some(recorder.default);
        strategy.run(&mut recorder).unwrap();
        assert_eq!(recorder.calls, vec!["Eq #0 -> L0", "Eq #1 -> L1"]);

        let mut recorder = Recorder::new(2);
        recorder.successor = Some(recorder.targets[1]);
        strategy.run(&mut recorder).unwrap();
        assert_eq!(recorder.calls, vec!["Eq #0 -> L0", "Ne #1 -> L2"]);
    }

    #[test]
    fn binary_search_splits_on_the_median() {
        let strategy = BinaryStrategy::new(simple_keys(&[50, 10, 40, 20, 30, 60, 70])).unwrap();
        assert_eq!(strategy.sorted(), &[1, 3, 4, 2, 0, 5, 6]);
        let mut recorder = Recorder::new(7);
        strategy.run(&mut recorder).unwrap();
        assert_eq!(
            recorder.calls,
            vec![
                // 40 splits [10, 20, 30, 40] from [50, 60, 70]
                "Gt #2 -> L8",
                // 20 splits [10, 20] from [30, 40]
                "Gt #3 -> L9",
                "Eq #1 -> L1",
                "Eq #3 -> L3",
                "jump L7",
                "L9:",
                "Eq #4 -> L4",
                "Eq #2 -> L2",
                "jump L7",
                "L8:",
                "Eq #0 -> L0",
                "Eq #5 -> L5",
                "Eq #6 -> L6",
                "jump L7",
            ]
        );
    }

    #[test]
    fn binary_search_compares_complex_keys_unsigned() {
        let keys = (1..=5).map(|v| Key::full(v << 40)).collect();
        let strategy = BinaryStrategy::new(keys).unwrap();
        let mut recorder = Recorder::new(5);
        strategy.run(&mut recorder).unwrap();
        assert_eq!(recorder.calls[0], "At #2 -> L6");
    }

    #[test]
    fn invalid_key_sets_are_rejected() {
        assert_eq!(
            SequentialStrategy::in_order(Vec::new()),
            Err(Error::EmptySwitch)
        );
        assert_eq!(
            SequentialStrategy::in_order(simple_keys(&[1, 2, 1])),
            Err(Error::DuplicateKey(2))
        );
        assert_eq!(
            SequentialStrategy::new(simple_keys(&[1, 2]), &[1.0]),
            Err(Error::ProbabilityCountMismatch {
                keys: 2,
                probabilities: 1
            })
        );
        assert_eq!(
            BinaryStrategy::new(vec![Key::Simple(1), Key::narrow(2)]),
            Err(Error::IncomparableKeys)
        );
    }
}
