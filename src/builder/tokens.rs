//! Pseudo-token allocation and the pseudo-to-final token map.

use rustc_hash::FxHashMap;

use crate::{
    metadata::{
        tables::TableId,
        token::{Token, PSEUDO_TOKEN_FLAG},
    },
    Error, Result,
};

/// Allocator for the pseudo-tokens of one build session.
///
/// Pseudo-tokens count up from 1 and remember which table their row will land in, so a pseudo
/// token placed into a cell can be checked against the column it is placed in.
#[derive(Clone, Debug, Default)]
pub struct PseudoTokens {
    tables: Vec<TableId>,
}

impl PseudoTokens {
    /// An empty allocator
    #[must_use]
    pub fn new() -> Self {
        PseudoTokens::default()
    }

    /// Allocate the next pseudo-token for a row of `table`.
    ///
    /// # Errors
    /// Returns [`Error::LimitExceeded`] once the pseudo-token space is used up.
    pub fn allocate(&mut self, table: TableId) -> Result<Token> {
        let next = self.tables.len() + 1;
        let Some(counter) = u32::try_from(next).ok().filter(|counter| counter & PSEUDO_TOKEN_FLAG == 0)
        else {
            return Err(limit_error!("pseudo-tokens", next, !PSEUDO_TOKEN_FLAG));
        };

        self.tables.push(table);
        Ok(Token::new(PSEUDO_TOKEN_FLAG | counter))
    }

    /// The table of the row `token` stands for, `None` if this allocator did not issue it
    #[must_use]
    pub fn table(&self, token: Token) -> Option<TableId> {
        if !token.is_pseudo() {
            return None;
        }
        let index = (token.value() & !PSEUDO_TOKEN_FLAG) as usize;
        index.checked_sub(1).and_then(|index| self.tables.get(index)).copied()
    }

    /// Number of pseudo-tokens issued
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// `true` if nothing was issued yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Iterate the issued pseudo-tokens
    pub fn iter(&self) -> impl Iterator<Item = (Token, TableId)> + '_ {
        self.tables
            .iter()
            .enumerate()
            .map(|(index, table)| (Token::new(PSEUDO_TOKEN_FLAG | (index as u32 + 1)), *table))
    }
}

/// The fixups of one build: each pseudo-token mapped to the final token of its row.
///
/// Handed out by a finished build so side records keyed by pseudo-tokens (debug information,
/// method bodies) can be translated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenMap {
    fixups: FxHashMap<Token, Token>,
}

impl TokenMap {
    /// An empty map
    #[must_use]
    pub fn new() -> Self {
        TokenMap::default()
    }

    /// Register the final token of `pseudo`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if `pseudo` is not a pseudo-token or `token` is, and
    /// [`Error::DuplicateFixup`] if `pseudo` already has a final token.
    pub fn register(&mut self, pseudo: Token, token: Token) -> Result<()> {
        if !pseudo.is_pseudo() {
            return Err(Error::InvalidToken(pseudo));
        }
        if token.is_pseudo() {
            return Err(Error::InvalidToken(token));
        }
        if self.fixups.contains_key(&pseudo) {
            return Err(Error::DuplicateFixup(pseudo));
        }

        log::trace!("fixup {:?} -> {}", pseudo, token);
        self.fixups.insert(pseudo, token);
        Ok(())
    }

    /// The final token of `pseudo`
    #[must_use]
    pub fn get(&self, pseudo: Token) -> Option<Token> {
        self.fixups.get(&pseudo).copied()
    }

    /// Translate `token`: pseudo-tokens through the map, real tokens unchanged.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedPseudoToken`] for a pseudo-token without fixup.
    pub fn resolve(&self, token: Token) -> Result<Token> {
        if !token.is_pseudo() {
            return Ok(token);
        }
        self.get(token).ok_or(Error::UnresolvedPseudoToken(token))
    }

    /// Number of fixups
    #[must_use]
    pub fn len(&self) -> usize {
        self.fixups.len()
    }

    /// `true` if there are no fixups
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fixups.is_empty()
    }

    /// Iterate the fixups in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (Token, Token)> + '_ {
        self.fixups.iter().map(|(pseudo, token)| (*pseudo, *token))
    }
}
