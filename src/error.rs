/*!
Errors raised while lowering a switch or laying out the emitted code
*/
use crate::asm::Label;
use thiserror::Error;

/// A switch lowering error
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum Error {
    /// A switch without any keys
    #[error("cannot lower a switch without keys")]
    EmptySwitch,
    /// The number of key targets does not match the number of keys
    #[error("switch has {keys} keys but {targets} key targets")]
    TargetCountMismatch {
        /// The number of keys supplied by the strategy
        keys: usize,
        /// The number of key targets supplied by the caller
        targets: usize,
    },
    /// The number of key probabilities does not match the number of keys
    #[error("switch has {keys} keys but {probabilities} key probabilities")]
    ProbabilityCountMismatch {
        /// The number of keys
        keys: usize,
        /// The number of probabilities
        probabilities: usize,
    },
    /// A complex key was supplied without a constant table base register
    #[error("a key must be loaded from the constant table, but no base register was given")]
    MissingConstantTableBase,
    /// The scratch register is the zero register
    #[error("the zero register cannot be used as a scratch register")]
    InvalidScratch,
    /// The scratch register aliases the key register
    #[error("the scratch register aliases the key register")]
    ScratchIsKey,
    /// A simple key which does not fit in a compare immediate
    #[error("key {0} does not fit in a compare immediate")]
    SimpleKeyOutOfRange(i64),
    /// A compressed key wider than 32 bits
    #[error("key {0:#x} does not fit in a compressed constant")]
    CompressedKeyTooWide(u64),
    /// A key index outside the switch
    #[error("key index {0} is out of bounds")]
    KeyIndexOutOfBounds(usize),
    /// The same key appears twice in a switch
    #[error("key #{0} appears more than once")]
    DuplicateKey(usize),
    /// Keys with no common ordering were given to an ordered strategy
    #[error("keys of different kinds cannot be ordered")]
    IncomparableKeys,
    /// A register number outside the register file
    #[error("register number {0} is out of range")]
    InvalidRegister(u8),
    /// A label bound twice in the same emission pass
    #[error("label {0} is already bound")]
    LabelAlreadyBound(Label),
    /// A label referenced by a branch but never bound
    #[error("label {0} is never bound")]
    UnboundLabel(Label),
    /// A label which was never allocated by the assembler it is used with
    #[error("label {0} does not belong to this assembler")]
    UnknownLabel(Label),
    /// A branch whose target lies outside the reach of its encoding
    #[error("branch at {at:#x} cannot reach {target} ({displacement} bytes away)")]
    BranchOutOfRange {
        /// The position of the branch instruction
        at: usize,
        /// The branch target
        target: Label,
        /// The displacement to the target, in bytes
        displacement: isize,
    },
}
