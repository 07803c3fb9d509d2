/*!
Miscellaneous utilities used throughout the switch lowering code
*/

/// Quickly implement `Display` using a given expression
#[macro_export]
macro_rules! quick_display {
    ($t:ty, $s:ident, $fmt:ident => $e:expr) => {
        impl std::fmt::Display for $t {
            fn fmt(&self, fmt: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
                let $s = self;
                let $fmt = fmt;
                $e
            }
        }
    };
}

/// Implement `Debug` for a type which implements `Display`
#[macro_export]
macro_rules! debug_from_display {
    ($t:ty) => {
        impl std::fmt::Debug for $t {
            fn fmt(&self, fmt: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
                std::fmt::Display::fmt(self, fmt)
            }
        }
    };
}

/// Check whether `value` fits in a signed immediate field of `bits` bits
#[inline]
pub fn is_simm(value: i64, bits: u32) -> bool {
    debug_assert!(bits > 0 && bits < 64);
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    min <= value && value <= max
}

/// Check whether `value` fits in a 5-bit signed immediate, the compare operand of a fused branch
#[inline]
pub fn is_simm5(value: i64) -> bool {
    is_simm(value, 5)
}

/// Check whether `value` fits in a 13-bit signed immediate, the operand of most arithmetic instructions
#[inline]
pub fn is_simm13(value: i64) -> bool {
    is_simm(value, 13)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_immediate_bounds() {
        assert!(is_simm5(15));
        assert!(is_simm5(-16));
        assert!(!is_simm5(16));
        assert!(!is_simm5(-17));
        assert!(is_simm13(4095));
        assert!(is_simm13(-4096));
        assert!(!is_simm13(4096));
        assert!(!is_simm13(-4097));
        assert!(is_simm(511, 10));
        assert!(!is_simm(512, 10));
    }
}
