//! Custom modifier runs (`modreq` / `modopt`, ECMA-335 II.23.2.7).
//!
//! A run is kept exactly as declared: an ordered list of marker and type entries, where a
//! [`ModifierEntry::Marker`] is only stored when the required flag changes. This keeps the run
//! loss-free for re-emission while making the common case (all required, or all optional) a single
//! marker followed by the types.
//!
//! Splitting a run into its required and optional groups is a projection. The established
//! inspection tooling reports each group in reverse declaration order, which is what
//! [`ModifierProjection::Reversed`] reproduces; [`ModifierProjection::Declared`] keeps the
//! declared order.

use crate::metadata::token::Token;

/// How [`CustomModifiers::required`] and [`CustomModifiers::optional`] order their result
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModifierProjection {
    /// Each group in reverse declaration order
    #[default]
    Reversed,
    /// Each group in declaration order
    Declared,
}

/// One entry of a modifier run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModifierEntry {
    /// The following types are required (`true`) or optional (`false`) modifiers
    Marker(bool),
    /// A modifier type, `TypeDefOrRefOrSpecEncoded`
    Type(Token),
}

/// An ordered run of custom modifiers
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CustomModifiers {
    entries: Vec<ModifierEntry>,
}

impl CustomModifiers {
    /// An empty run
    #[must_use]
    pub fn new() -> Self {
        CustomModifiers::default()
    }

    /// Append a modifier, adding a marker only if `required` differs from the current group
    pub fn push(&mut self, required: bool, modifier: Token) {
        if self.current_flag() != Some(required) {
            self.entries.push(ModifierEntry::Marker(required));
        }
        self.entries.push(ModifierEntry::Type(modifier));
    }

    fn current_flag(&self) -> Option<bool> {
        self.entries.iter().rev().find_map(|entry| match entry {
            ModifierEntry::Marker(required) => Some(*required),
            ModifierEntry::Type(_) => None,
        })
    }

    /// `true` if the run holds no modifier
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of modifiers, markers not counted
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, ModifierEntry::Type(_)))
            .count()
    }

    /// The raw run, markers included
    #[must_use]
    pub fn entries(&self) -> &[ModifierEntry] {
        &self.entries
    }

    /// `(required, type)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (bool, Token)> + '_ {
        let mut required = false;
        self.entries.iter().filter_map(move |entry| match entry {
            ModifierEntry::Marker(flag) => {
                required = *flag;
                None
            }
            ModifierEntry::Type(token) => Some((required, *token)),
        })
    }

    /// All tokens of the run, in declaration order
    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.iter().map(|(_, token)| token)
    }

    /// The required modifiers
    #[must_use]
    pub fn required(&self, projection: ModifierProjection) -> Vec<Token> {
        self.group(true, projection)
    }

    /// The optional modifiers
    #[must_use]
    pub fn optional(&self, projection: ModifierProjection) -> Vec<Token> {
        self.group(false, projection)
    }

    fn group(&self, required: bool, projection: ModifierProjection) -> Vec<Token> {
        let mut tokens: Vec<Token> = self
            .iter()
            .filter(|(flag, _)| *flag == required)
            .map(|(_, token)| token)
            .collect();

        if projection == ModifierProjection::Reversed {
            tokens.reverse();
        }
        tokens
    }

    /// Rewrite every modifier token through `map`
    pub fn map_tokens(&mut self, mut map: impl FnMut(Token) -> Token) {
        for entry in &mut self.entries {
            if let ModifierEntry::Type(token) = entry {
                *token = map(*token);
            }
        }
    }
}

impl FromIterator<(bool, Token)> for CustomModifiers {
    fn from_iter<I: IntoIterator<Item = (bool, Token)>>(iter: I) -> Self {
        let mut modifiers = CustomModifiers::new();
        for (required, token) in iter {
            modifiers.push(required, token);
        }
        modifiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Token = Token::new(0x0100_0001);
    const B: Token = Token::new(0x0100_0002);
    const C: Token = Token::new(0x0100_0003);
    const D: Token = Token::new(0x0100_0004);

    #[test]
    fn markers_only_on_change() {
        let modifiers: CustomModifiers =
            [(true, A), (true, B), (false, C), (true, D)].into_iter().collect();

        assert_eq!(
            modifiers.entries(),
            &[
                ModifierEntry::Marker(true),
                ModifierEntry::Type(A),
                ModifierEntry::Type(B),
                ModifierEntry::Marker(false),
                ModifierEntry::Type(C),
                ModifierEntry::Marker(true),
                ModifierEntry::Type(D),
            ]
        );
        assert_eq!(modifiers.len(), 4);
        assert_eq!(
            modifiers.iter().collect::<Vec<_>>(),
            vec![(true, A), (true, B), (false, C), (true, D)]
        );
    }

    #[test]
    fn projections() {
        let modifiers: CustomModifiers =
            [(true, A), (false, B), (true, C), (false, D)].into_iter().collect();

        assert_eq!(modifiers.required(ModifierProjection::Reversed), vec![C, A]);
        assert_eq!(modifiers.optional(ModifierProjection::Reversed), vec![D, B]);
        assert_eq!(modifiers.required(ModifierProjection::Declared), vec![A, C]);
        assert_eq!(modifiers.optional(ModifierProjection::Declared), vec![B, D]);
    }

    #[test]
    fn empty() {
        let modifiers = CustomModifiers::new();
        assert!(modifiers.is_empty());
        assert!(modifiers.required(ModifierProjection::Reversed).is_empty());
        assert_eq!(modifiers.iter().count(), 0);
    }
}
