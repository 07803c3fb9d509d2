/*!
Switch keys
*/
use crate::error::Error;
use crate::target::Width;
use crate::util::is_simm13;
use crate::{debug_from_display, quick_display};
use num::ToPrimitive;

/// A compile-time constant compared against the switch value
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    /// A key small enough to be an immediate operand of a compare
    Simple(i32),
    /// A key which must be loaded from the constant table before it can be compared
    Complex(ComplexKey),
}

/// A key living in the constant table, such as the address of a runtime structure
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ComplexKey {
    bits: u64,
    compressed: bool,
}

/// The kind of a key, which determines how it is compared
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum KeyKind {
    /// An immediate key
    Simple,
    /// A compressed (32-bit) constant-table key
    ComplexNarrow,
    /// A full-width (64-bit) constant-table key
    ComplexFull,
}

impl Key {
    /// Create a simple key. Return an error if it does not fit in a compare immediate.
    pub fn simple<I: ToPrimitive>(value: I) -> Result<Key, Error> {
        match value.to_i64() {
            Some(value) if is_simm13(value) => Ok(Key::Simple(value as i32)),
            Some(value) => Err(Error::SimpleKeyOutOfRange(value)),
            None => Err(Error::SimpleKeyOutOfRange(i64::MAX)),
        }
    }
    /// Create a compressed key
    pub fn narrow(bits: u32) -> Key {
        Key::Complex(ComplexKey {
            bits: bits as u64,
            compressed: true,
        })
    }
    /// Create a full-width key
    pub fn full(bits: u64) -> Key {
        Key::Complex(ComplexKey {
            bits,
            compressed: false,
        })
    }
    /// Create a constant-table key. Return an error if a compressed key does not fit in 32 bits.
    pub fn complex(bits: u64, compressed: bool) -> Result<Key, Error> {
        if compressed && bits > u32::MAX as u64 {
            return Err(Error::CompressedKeyTooWide(bits));
        }
        Ok(Key::Complex(ComplexKey { bits, compressed }))
    }
    /// Get the kind of this key
    #[inline]
    pub fn kind(&self) -> KeyKind {
        match self {
            Key::Simple(_) => KeyKind::Simple,
            Key::Complex(c) if c.compressed => KeyKind::ComplexNarrow,
            Key::Complex(_) => KeyKind::ComplexFull,
        }
    }
    /// Whether this key must be loaded from the constant table
    #[inline]
    pub fn is_complex(&self) -> bool {
        self.kind() != KeyKind::Simple
    }
    /// The ordinal of this key, used to sort keys of the same kind
    pub fn ordinal(&self) -> i128 {
        match self {
            Key::Simple(value) => *value as i128,
            Key::Complex(c) => c.bits as i128,
        }
    }
}

impl ComplexKey {
    /// The raw bits of this key
    #[inline]
    pub fn bits(&self) -> u64 {
        self.bits
    }
    /// Whether this key is compressed
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
    /// The width of this key in the constant table, and of the comparison against it
    #[inline]
    pub fn width(&self) -> Width {
        if self.compressed {
            Width::Word
        } else {
            Width::Xword
        }
    }
}

quick_display!(Key, k, fmt => match k {
    Key::Simple(value) => write!(fmt, "#{}", value),
    Key::Complex(c) if c.compressed => write!(fmt, "#narrow({:#x})", c.bits),
    Key::Complex(c) => write!(fmt, "#full({:#x})", c.bits),
});
debug_from_display!(Key);

#[cfg(feature = "rand")]
mod rand_impl {
    use super::*;
    use rand::distributions::{Distribution, Standard};
    use rand::Rng;

    impl Distribution<Key> for Standard {
        fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Key {
            match rng.gen_range(0, 3) {
                0 => Key::Simple(rng.gen_range(-4096, 4096)),
                1 => Key::narrow(rng.gen()),
                _ => Key::full(rng.gen()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_keys_must_fit_an_immediate() {
        assert_eq!(Key::simple(4095).unwrap(), Key::Simple(4095));
        assert_eq!(Key::simple(-4096i64).unwrap(), Key::Simple(-4096));
        assert_eq!(Key::simple(4096), Err(Error::SimpleKeyOutOfRange(4096)));
        assert!(Key::simple(u64::MAX).is_err());
    }

    #[test]
    fn key_kinds() {
        assert_eq!(Key::Simple(3).kind(), KeyKind::Simple);
        assert_eq!(Key::narrow(3).kind(), KeyKind::ComplexNarrow);
        assert_eq!(Key::full(3).kind(), KeyKind::ComplexFull);
        assert!(!Key::Simple(3).is_complex());
        assert!(Key::full(3).is_complex());
        assert_eq!(Key::complex(3, true).unwrap(), Key::narrow(3));
        assert_eq!(
            Key::complex(1 << 40, true),
            Err(Error::CompressedKeyTooWide(1 << 40))
        );
        assert_eq!(Key::complex(1 << 40, false).unwrap(), Key::full(1 << 40));
    }

    #[test]
    fn key_printing() {
        assert_eq!(format!("{}", Key::Simple(-3)), "#-3");
        assert_eq!(format!("{:?}", Key::narrow(0x10)), "#narrow(0x10)");
        assert_eq!(format!("{}", Key::full(0xff)), "#full(0xff)");
    }
}
