use crate::metadata::signatures::TypeSignature;

/// `true` if a value of primitive type `from` converts implicitly to primitive type `to`.
///
/// Only widening conversions qualify: no narrowing, no sign change that loses values, no boxing.
/// Identity is not a widening.
#[must_use]
#[allow(clippy::unnested_or_patterns)]
pub fn widens(from: &TypeSignature, to: &TypeSignature) -> bool {
    use TypeSignature::{Char, I1, I2, I4, I8, R4, R8, U1, U2, U4, U8};

    matches!(
        (from, to),
        (Char, U2 | U4 | I4 | U8 | I8 | R4 | R8)
            | (U1, Char | U2 | I2 | U4 | I4 | U8 | I8 | R4 | R8)
            | (I1, I2 | I4 | I8 | R4 | R8)
            | (U2, U4 | I4 | U8 | I8 | R4 | R8)
            | (I2, I4 | I8 | R4 | R8)
            | (U4, U8 | I8 | R4 | R8)
            | (I4, I8 | R4 | R8)
            | (U8, R4 | R8)
            | (I8, R4 | R8)
            | (R4, R8)
    )
}
