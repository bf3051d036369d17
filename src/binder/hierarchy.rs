use rustc_hash::FxHashMap;

use crate::metadata::{
    image::MetadataImage,
    tables::{interfaceimpl, typedef, TableId},
    token::Token,
};

/// Longest base-type chain followed before a hierarchy is treated as cyclic
pub const MAX_HIERARCHY_DEPTH: usize = 256;

/// The inheritance relation the binder decides assignability with.
///
/// Types are named by TypeDef, TypeRef or TypeSpec tokens. Tokens are compared as they are, so a
/// TypeRef and the TypeDef it resolves to are different types to the binder.
pub trait TypeHierarchy {
    /// The direct base type of `ty`, `None` for a root or an unknown type
    fn base_type(&self, ty: Token) -> Option<Token>;

    /// The interfaces `ty` itself declares
    fn interfaces(&self, ty: Token) -> Vec<Token>;

    /// Number of base types above `ty`
    fn depth(&self, ty: Token) -> usize {
        let mut depth = 0;
        let mut current = ty;
        while let Some(base) = self.base_type(current) {
            depth += 1;
            if depth >= MAX_HIERARCHY_DEPTH {
                break;
            }
            current = base;
        }
        depth
    }

    /// `true` if `base` is a strict ancestor of `ty`
    fn is_subclass_of(&self, ty: Token, base: Token) -> bool {
        let mut current = ty;
        for _ in 0..MAX_HIERARCHY_DEPTH {
            match self.base_type(current) {
                Some(next) if next == base => return true,
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    /// `true` if `ty`, one of its base types or one of their interfaces declares `interface`
    fn implements(&self, ty: Token, interface: Token) -> bool {
        let mut pending = vec![ty];
        let mut visited = Vec::new();
        while let Some(current) = pending.pop() {
            if visited.contains(&current) || visited.len() >= MAX_HIERARCHY_DEPTH {
                continue;
            }
            visited.push(current);

            let declared = self.interfaces(current);
            if declared.contains(&interface) {
                return true;
            }
            pending.extend(declared);
            pending.extend(self.base_type(current));
        }
        false
    }

    /// `true` if a reference of type `from` can be stored in a location of type `to`
    fn is_assignable(&self, from: Token, to: Token) -> bool {
        from == to || self.is_subclass_of(from, to) || self.implements(from, to)
    }
}

impl TypeHierarchy for MetadataImage<'_> {
    fn base_type(&self, ty: Token) -> Option<Token> {
        if ty.table_id() != Some(TableId::TypeDef) {
            return None;
        }
        self.table(TableId::TypeDef)?
            .get(ty.row())?
            .reference(typedef::EXTENDS)
    }

    fn interfaces(&self, ty: Token) -> Vec<Token> {
        let Some(table) = self.table(TableId::InterfaceImpl) else {
            return Vec::new();
        };
        table
            .find_by_key(ty)
            .filter_map(|rid| table.get(rid)?.reference(interfaceimpl::INTERFACE))
            .collect()
    }
}

/// A hierarchy assembled by hand, for types that are not in one image.
#[derive(Clone, Debug, Default)]
pub struct InMemoryHierarchy {
    bases: FxHashMap<Token, Token>,
    interfaces: FxHashMap<Token, Vec<Token>>,
}

impl InMemoryHierarchy {
    /// An empty hierarchy
    #[must_use]
    pub fn new() -> Self {
        InMemoryHierarchy::default()
    }

    /// Record `ty` with its base type and declared interfaces
    pub fn add_type(&mut self, ty: Token, base: Option<Token>, interfaces: &[Token]) {
        if let Some(base) = base {
            self.bases.insert(ty, base);
        }
        self.interfaces.insert(ty, interfaces.to_vec());
    }
}

impl TypeHierarchy for InMemoryHierarchy {
    fn base_type(&self, ty: Token) -> Option<Token> {
        self.bases.get(&ty).copied()
    }

    fn interfaces(&self, ty: Token) -> Vec<Token> {
        self.interfaces.get(&ty).cloned().unwrap_or_default()
    }
}
