/*!
Registers, condition codes and CPU features of the delayed-branch target

# Overview
The target is modelled on SPARC V9: 32 integer registers with `%g0` hardwired to zero, two sets of
integer condition codes (`%icc` for 32-bit and `%xcc` for 64-bit comparisons), delayed branches with
annulment, and the optional fused compare-and-branch (`cbcond`) family.
*/
use crate::error::Error;
use crate::quick_display;

mod config;
pub use config::*;

/// An integer register
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Register(u8);

/// The zero register. Reads as zero, writes are discarded.
pub const G0: Register = Register(0);

/// The number of integer registers
pub const NUM_REGISTERS: u8 = 32;

impl Register {
    /// Get a register by number. Return an error if out of range.
    pub fn try_new(number: u8) -> Result<Register, Error> {
        if number < NUM_REGISTERS {
            Ok(Register(number))
        } else {
            Err(Error::InvalidRegister(number))
        }
    }
    /// Get the `n`th global register
    pub const fn g(n: u8) -> Register {
        Register(n & 7)
    }
    /// Get the `n`th output register
    pub const fn o(n: u8) -> Register {
        Register(8 + (n & 7))
    }
    /// Get the `n`th local register
    pub const fn l(n: u8) -> Register {
        Register(16 + (n & 7))
    }
    /// Get the `n`th input register
    pub const fn i(n: u8) -> Register {
        Register(24 + (n & 7))
    }
    /// Get the number of this register, as encoded in an instruction
    #[inline]
    pub fn number(self) -> u8 {
        self.0
    }
    /// Whether this is the zero register
    #[inline]
    pub fn is_zero(self) -> bool {
        self == G0
    }
}

quick_display!(Register, r, fmt => {
    let bank = match r.0 / 8 {
        0 => 'g',
        1 => 'o',
        2 => 'l',
        _ => 'i',
    };
    write!(fmt, "%{}{}", bank, r.0 % 8)
});

/// The width of a value being compared or loaded
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Width {
    /// A 32-bit word
    Word,
    /// A 64-bit extended word
    Xword,
}

impl Width {
    /// The size of a value of this width, in bytes
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            Width::Word => 4,
            Width::Xword => 8,
        }
    }
    /// The condition codes set by a comparison of this width
    #[inline]
    pub fn cc(self) -> CC {
        match self {
            Width::Word => CC::Icc,
            Width::Xword => CC::Xcc,
        }
    }
}

/// An integer condition code set
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CC {
    /// The 32-bit condition codes
    Icc,
    /// The 64-bit condition codes
    Xcc,
}

impl CC {
    /// Whether these are the 64-bit condition codes
    #[inline]
    pub fn is_xcc(self) -> bool {
        self == CC::Xcc
    }
}

quick_display!(CC, cc, fmt => match cc {
    CC::Icc => write!(fmt, "%icc"),
    CC::Xcc => write!(fmt, "%xcc"),
});

/// An architecture-neutral comparison condition, as requested by a switch strategy
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Condition {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Signed less than
    Lt,
    /// Signed less than or equal
    Le,
    /// Signed greater than
    Gt,
    /// Signed greater than or equal
    Ge,
    /// Unsigned less than ("below")
    Bt,
    /// Unsigned less than or equal
    Be,
    /// Unsigned greater than ("above")
    At,
    /// Unsigned greater than or equal
    Ae,
}

impl Condition {
    /// The condition which holds exactly when this one does not
    pub fn negate(self) -> Condition {
        use Condition::*;
        match self {
            Eq => Ne,
            Ne => Eq,
            Lt => Ge,
            Le => Gt,
            Gt => Le,
            Ge => Lt,
            Bt => Ae,
            Be => At,
            At => Be,
            Ae => Bt,
        }
    }
}

/// A condition as encoded in the `cond` field of a branch
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ConditionFlag {
    /// Never branch
    Never,
    /// Branch if equal
    Equal,
    /// Branch if signed less or equal
    LessEqual,
    /// Branch if signed less
    Less,
    /// Branch if unsigned less or equal
    LessEqualUnsigned,
    /// Branch if carry set, i.e. unsigned less
    CarrySet,
    /// Branch if negative
    Negative,
    /// Branch if overflow set
    OverflowSet,
    /// Always branch
    Always,
    /// Branch if not equal
    NotEqual,
    /// Branch if signed greater
    Greater,
    /// Branch if signed greater or equal
    GreaterEqual,
    /// Branch if unsigned greater
    GreaterUnsigned,
    /// Branch if carry clear, i.e. unsigned greater or equal
    CarryClear,
    /// Branch if positive
    Positive,
    /// Branch if overflow clear
    OverflowClear,
}

impl ConditionFlag {
    /// The value of the `cond` field for this flag
    pub fn value(self) -> u32 {
        use ConditionFlag::*;
        match self {
            Never => 0x0,
            Equal => 0x1,
            LessEqual => 0x2,
            Less => 0x3,
            LessEqualUnsigned => 0x4,
            CarrySet => 0x5,
            Negative => 0x6,
            OverflowSet => 0x7,
            Always => 0x8,
            NotEqual => 0x9,
            Greater => 0xa,
            GreaterEqual => 0xb,
            GreaterUnsigned => 0xc,
            CarryClear => 0xd,
            Positive => 0xe,
            OverflowClear => 0xf,
        }
    }
    /// The assembler mnemonic suffix for this flag
    pub fn mnemonic(self) -> &'static str {
        use ConditionFlag::*;
        match self {
            Never => "n",
            Equal => "e",
            LessEqual => "le",
            Less => "l",
            LessEqualUnsigned => "leu",
            CarrySet => "cs",
            Negative => "neg",
            OverflowSet => "vs",
            Always => "a",
            NotEqual => "ne",
            Greater => "g",
            GreaterEqual => "ge",
            GreaterUnsigned => "gu",
            CarryClear => "cc",
            Positive => "pos",
            OverflowClear => "vc",
        }
    }
}

impl From<Condition> for ConditionFlag {
    /// Map an integer comparison condition onto the branch condition testing it after a `cmp`
    fn from(condition: Condition) -> ConditionFlag {
        match condition {
            Condition::Eq => ConditionFlag::Equal,
            Condition::Ne => ConditionFlag::NotEqual,
            Condition::Lt => ConditionFlag::Less,
            Condition::Le => ConditionFlag::LessEqual,
            Condition::Gt => ConditionFlag::Greater,
            Condition::Ge => ConditionFlag::GreaterEqual,
            Condition::Bt => ConditionFlag::CarrySet,
            Condition::Be => ConditionFlag::LessEqualUnsigned,
            Condition::At => ConditionFlag::GreaterUnsigned,
            Condition::Ae => ConditionFlag::CarryClear,
        }
    }
}

/// An optional CPU feature
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CpuFeature {
    /// Fused compare-and-branch instructions
    Cbcond,
}

impl CpuFeature {
    #[inline]
    fn bit(self) -> u32 {
        match self {
            CpuFeature::Cbcond => 1,
        }
    }
}

/// A set of CPU features
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct CpuFeatures(u32);

impl CpuFeatures {
    /// The empty feature set
    #[inline]
    pub fn none() -> CpuFeatures {
        CpuFeatures(0)
    }
    /// Add a feature to this set
    #[inline]
    pub fn with(self, feature: CpuFeature) -> CpuFeatures {
        CpuFeatures(self.0 | feature.bit())
    }
    /// Check whether a feature is in this set
    #[inline]
    pub fn has(self, feature: CpuFeature) -> bool {
        self.0 & feature.bit() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_names() {
        assert_eq!(format!("{}", G0), "%g0");
        assert_eq!(format!("{}", Register::o(3)), "%o3");
        assert_eq!(format!("{}", Register::l(7)), "%l7");
        assert_eq!(format!("{}", Register::i(0)), "%i0");
        assert_eq!(Register::try_new(9).unwrap(), Register::o(1));
        assert_eq!(Register::try_new(32), Err(Error::InvalidRegister(32)));
        assert!(G0.is_zero());
        assert!(!Register::g(1).is_zero());
    }

    #[test]
    fn conditions_negate_to_their_complement() {
        use Condition::*;
        for &c in &[Eq, Ne, Lt, Le, Gt, Ge, Bt, Be, At, Ae] {
            assert_eq!(c.negate().negate(), c);
            assert_ne!(
                ConditionFlag::from(c).value(),
                ConditionFlag::from(c.negate()).value()
            );
            // Negated conditions differ exactly in the high bit of the `cond` field
            assert_eq!(
                ConditionFlag::from(c).value() ^ ConditionFlag::from(c.negate()).value(),
                0x8
            );
        }
    }

    #[test]
    fn widths_select_condition_codes() {
        assert_eq!(Width::Word.cc(), CC::Icc);
        assert_eq!(Width::Xword.cc(), CC::Xcc);
        assert_eq!(Width::Word.bytes(), 4);
        assert_eq!(Width::Xword.bytes(), 8);
        assert!(CC::Xcc.is_xcc());
    }

    #[test]
    fn feature_sets() {
        let features = CpuFeatures::none();
        assert!(!features.has(CpuFeature::Cbcond));
        assert!(features.with(CpuFeature::Cbcond).has(CpuFeature::Cbcond));
    }
}
