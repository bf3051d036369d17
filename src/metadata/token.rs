//! Metadata tokens.
//!
//! A token is a 32-bit value `(table << 24) | row` naming one row of one metadata table, with a
//! 1-based row index. Row 0 never names a row. User strings use the pseudo-table `0x70` with the
//! `#US` heap offset in the low 24 bits.
//!
//! While a new image is being built some rows do not have their final position yet. Those rows are
//! named by pseudo-tokens: values with the top bit set, which no real token ever has. A pseudo-token
//! never reaches the emitted metadata; see [`crate::builder::PseudoTokens`].

use std::fmt;

use crate::metadata::tables::TableId;

/// Table byte used by tokens that reference the `#US` heap
pub const USER_STRING_TABLE: u8 = 0x70;

/// Bit that marks a pseudo-token
pub const PSEUDO_TOKEN_FLAG: u32 = 0x8000_0000;

/// A metadata token.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(pub u32);

impl Token {
    /// Create a token from its raw value
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Create a token for `row` (1-based) of `table`
    #[must_use]
    pub const fn from_parts(table: TableId, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Create a user-string token for the given `#US` offset
    #[must_use]
    pub const fn user_string(offset: u32) -> Self {
        Token(((USER_STRING_TABLE as u32) << 24) | (offset & 0x00FF_FFFF))
    }

    /// The raw token value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// The table byte
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The table this token points into, `None` for user strings, pseudo-tokens and garbage
    #[must_use]
    pub fn table_id(&self) -> Option<TableId> {
        TableId::from_token(*self)
    }

    /// The 1-based row index
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// `true` if the row index is 0, which names nothing
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.row() == 0
    }

    /// `true` for builder pseudo-tokens
    #[must_use]
    pub const fn is_pseudo(&self) -> bool {
        self.0 & PSEUDO_TOKEN_FLAG != 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pseudo() {
            return write!(f, "Token(pseudo #{})", self.0 & !PSEUDO_TOKEN_FLAG);
        }

        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parts() {
        let token = Token::new(0x0600_0001);
        assert_eq!(token.value(), 0x0600_0001);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 1);
        assert_eq!(token.table_id(), Some(TableId::MethodDef));

        let token = Token::from_parts(TableId::TypeSpec, 0x12);
        assert_eq!(token.value(), 0x1B00_0012);
    }

    #[test]
    fn null_and_pseudo() {
        assert!(Token::new(0x0200_0000).is_null());
        assert!(!Token::new(0x0200_0001).is_null());
        assert!(!Token::new(0x0200_0001).is_pseudo());

        let pseudo = Token::new(PSEUDO_TOKEN_FLAG | 5);
        assert!(pseudo.is_pseudo());
        assert_eq!(pseudo.table_id(), None);
        assert_eq!(format!("{:?}", pseudo), "Token(pseudo #5)");
    }

    #[test]
    fn user_string() {
        let token = Token::user_string(0x1A);
        assert_eq!(token.value(), 0x7000_001A);
        assert_eq!(token.table_id(), None);
    }

    #[test]
    fn formatting() {
        let token = Token::new(0x0200_0005);
        assert_eq!(format!("{}", token), "0x02000005");
        assert_eq!(
            format!("{:?}", token),
            "Token(0x02000005, table: 0x02, row: 5)"
        );
    }

    #[test]
    fn ordering_and_hashing() {
        let mut tokens = vec![Token(0x0600_0002), Token(0x0200_0001), Token(0x0600_0001)];
        tokens.sort();
        assert_eq!(
            tokens,
            vec![Token(0x0200_0001), Token(0x0600_0001), Token(0x0600_0002)]
        );

        let mut map = HashMap::new();
        map.insert(Token(0x0600_0001), "method");
        assert_eq!(map.get(&Token::from(0x0600_0001)), Some(&"method"));
    }
}
