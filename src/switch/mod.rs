/*!
Lowering switches to sequences of comparisons and branches

# Overview
A switch compares one value against a set of [`Key`]s and branches to the target of the matching key, or
to a default target if none matches. A [`SwitchStrategy`] decides which comparisons to emit and in which
order; the [`SwitchEmitter`] emits each one as the cheapest correct instruction sequence; a [`SwitchOp`]
ties the two together, after validating its inputs.
*/

pub mod emitter;
pub mod key;
pub mod materialize;
pub mod op;
pub mod reach;
pub mod size;
pub mod strategy;

pub use emitter::SwitchEmitter;
pub use key::{ComplexKey, Key, KeyKind};
pub use materialize::Materialization;
pub use op::SwitchOp;
pub use size::{SizeCounter, SizeEstimate};
pub use strategy::{BinaryStrategy, SequentialStrategy, SwitchClosure, SwitchStrategy};
