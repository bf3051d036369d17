use std::cmp::Ordering;

use crate::{
    binder::{hierarchy::TypeHierarchy, widening::widens},
    metadata::{
        signatures::{SignatureMethod, SignatureParameter, SignatureProperty, TypeSignature},
        token::Token,
    },
    Error, Result,
};

/// A method the binder may pick.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCandidate {
    /// MethodDef or MemberRef token of the method
    pub token: Token,
    /// The type that declares the method
    pub declaring_type: Token,
    /// Parameter types, in order; by-ref parameters are `ByRef`
    pub params: Vec<TypeSignature>,
}

impl MethodCandidate {
    /// A candidate described by its method signature
    #[must_use]
    pub fn from_signature(token: Token, declaring_type: Token, signature: &SignatureMethod) -> Self {
        MethodCandidate {
            token,
            declaring_type,
            params: signature.params.iter().map(parameter_type).collect(),
        }
    }
}

/// A property the binder may pick.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyCandidate {
    /// Property token
    pub token: Token,
    /// The type that declares the property
    pub declaring_type: Token,
    /// Property type
    pub property_type: TypeSignature,
    /// Indexer parameter types, empty for a plain property
    pub params: Vec<TypeSignature>,
}

impl PropertyCandidate {
    /// A candidate described by its property signature
    #[must_use]
    pub fn from_signature(
        token: Token,
        declaring_type: Token,
        signature: &SignatureProperty,
    ) -> Self {
        PropertyCandidate {
            token,
            declaring_type,
            property_type: signature.base.clone(),
            params: signature.params.iter().map(parameter_type).collect(),
        }
    }
}

fn parameter_type(param: &SignatureParameter) -> TypeSignature {
    if param.by_ref {
        TypeSignature::ByRef(Box::new(param.base.clone()))
    } else {
        param.base.clone()
    }
}

/// Which of two candidates a comparison favours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preference {
    First,
    Second,
    Neither,
}

/// Picks the best overload for a list of argument types.
///
/// A candidate is applicable when it takes as many parameters as there are arguments and every
/// argument is identical to, widens to, or derives from its parameter. Among the applicable ones
/// the most specific wins: a candidate is better when each of its parameters is at least as
/// specific as the other's and one is strictly more specific. Candidates with identical parameter
/// lists are told apart by the depth of their declaring type, the most derived one wins.
///
/// # Examples
///
/// ```rust
/// use cilmeta::binder::{Binder, InMemoryHierarchy, MethodCandidate};
/// use cilmeta::metadata::{signatures::TypeSignature, token::Token};
///
/// let hierarchy = InMemoryHierarchy::new();
/// let binder = Binder::new(&hierarchy);
/// let owner = Token::new(0x0200_0002);
///
/// let candidates = [
///     MethodCandidate { token: Token::new(0x0600_0001), declaring_type: owner, params: vec![TypeSignature::I8] },
///     MethodCandidate { token: Token::new(0x0600_0002), declaring_type: owner, params: vec![TypeSignature::I4] },
/// ];
/// let best = binder.select_method(&candidates, &[TypeSignature::I4])?;
/// assert_eq!(best.map(|c| c.token), Some(Token::new(0x0600_0002)));
/// # Ok::<(), cilmeta::Error>(())
/// ```
pub struct Binder<'h, H: TypeHierarchy + ?Sized> {
    hierarchy: &'h H,
}

impl<'h, H: TypeHierarchy + ?Sized> Binder<'h, H> {
    /// A binder deciding assignability through `hierarchy`
    pub fn new(hierarchy: &'h H) -> Self {
        Binder { hierarchy }
    }

    /// The most specific method callable with `args`.
    ///
    /// # Errors
    /// Returns [`Error::AmbiguousMatch`] when no single candidate is better than all others.
    /// Returns `Ok(None)` when no candidate is applicable.
    pub fn select_method<'c>(
        &self,
        candidates: &'c [MethodCandidate],
        args: &[TypeSignature],
    ) -> Result<Option<&'c MethodCandidate>> {
        let applicable: Vec<&MethodCandidate> = candidates
            .iter()
            .filter(|candidate| self.accepts_all(&candidate.params, args))
            .collect();

        let Some((&first, rest)) = applicable.split_first() else {
            return Ok(None);
        };

        let mut best = first;
        let mut ambiguous = false;
        for &candidate in rest {
            match self.compare_methods(best, candidate, args) {
                Preference::First => {}
                Preference::Second => {
                    // A strictly better leader clears earlier ties
                    best = candidate;
                    ambiguous = false;
                }
                Preference::Neither => ambiguous = true,
            }
        }
        // The winner must also beat the candidates it never faced
        ambiguous |= applicable.iter().any(|&other| {
            !std::ptr::eq(other, best) && self.compare_methods(best, other, args) != Preference::First
        });

        if ambiguous {
            log::debug!("no single best overload among {} candidates", applicable.len());
            return Err(Error::AmbiguousMatch(format!(
                "{} applicable methods, none more specific than {}",
                applicable.len(),
                best.token
            )));
        }
        Ok(Some(best))
    }

    /// The most specific property matching `property_type` and the indexer arguments `indexes`.
    ///
    /// With `property_type` set, only properties whose type accepts it are applicable.
    ///
    /// # Errors
    /// Returns [`Error::AmbiguousMatch`] when no single candidate is better than all others.
    /// Returns `Ok(None)` when no candidate is applicable.
    pub fn select_property<'c>(
        &self,
        candidates: &'c [PropertyCandidate],
        property_type: Option<&TypeSignature>,
        indexes: &[TypeSignature],
    ) -> Result<Option<&'c PropertyCandidate>> {
        let applicable: Vec<&PropertyCandidate> = candidates
            .iter()
            .filter(|candidate| {
                self.accepts_all(&candidate.params, indexes)
                    && property_type.is_none_or(|ty| self.accepts(&candidate.property_type, ty))
            })
            .collect();

        let Some((&first, rest)) = applicable.split_first() else {
            return Ok(None);
        };

        let mut best = first;
        let mut ambiguous = false;
        for &candidate in rest {
            match self.compare_properties(best, candidate, property_type, indexes) {
                Preference::First => {}
                Preference::Second => {
                    best = candidate;
                    ambiguous = false;
                }
                Preference::Neither => ambiguous = true,
            }
        }
        ambiguous |= applicable.iter().any(|&other| {
            !std::ptr::eq(other, best)
                && self.compare_properties(best, other, property_type, indexes) != Preference::First
        });

        if ambiguous {
            return Err(Error::AmbiguousMatch(format!(
                "{} applicable properties, none more specific than {}",
                applicable.len(),
                best.token
            )));
        }
        Ok(Some(best))
    }

    /// `true` if an argument of type `arg` can be passed to a parameter of type `param`
    pub fn accepts(&self, param: &TypeSignature, arg: &TypeSignature) -> bool {
        let param = param.unmodified();
        let arg = arg.unmodified();
        if param == arg || widens(arg, param) {
            return true;
        }

        match (param, arg) {
            (TypeSignature::Object, arg) => is_reference_type(arg),
            (TypeSignature::Class(to), TypeSignature::Class(from)) => {
                self.hierarchy.is_assignable(*from, *to)
            }
            (TypeSignature::Class(to), TypeSignature::GenericInst(base, _)) => {
                matches!(base.unmodified(), TypeSignature::Class(from) if self.hierarchy.is_assignable(*from, *to))
            }
            (TypeSignature::SzArray(to), TypeSignature::SzArray(from)) => {
                is_reference_type(&from.base) && self.accepts(&to.base, &from.base)
            }
            _ => false,
        }
    }

    fn accepts_all(&self, params: &[TypeSignature], args: &[TypeSignature]) -> bool {
        params.len() == args.len()
            && params
                .iter()
                .zip(args)
                .all(|(param, arg)| self.accepts(param, arg))
    }

    fn compare_methods(
        &self,
        first: &MethodCandidate,
        second: &MethodCandidate,
        args: &[TypeSignature],
    ) -> Preference {
        match self.compare_params(&first.params, &second.params, args) {
            Preference::Neither if first.params == second.params => {
                self.compare_depth(first.declaring_type, second.declaring_type)
            }
            preference => preference,
        }
    }

    fn compare_properties(
        &self,
        first: &PropertyCandidate,
        second: &PropertyCandidate,
        property_type: Option<&TypeSignature>,
        indexes: &[TypeSignature],
    ) -> Preference {
        let mut preference = self.compare_params(&first.params, &second.params, indexes);
        if preference == Preference::Neither {
            if let Some(ty) = property_type {
                preference = self.compare_types(&first.property_type, &second.property_type, ty);
            }
        }

        if preference == Preference::Neither
            && first.params == second.params
            && first.property_type == second.property_type
        {
            preference = self.compare_depth(first.declaring_type, second.declaring_type);
        }
        preference
    }

    fn compare_params(
        &self,
        first: &[TypeSignature],
        second: &[TypeSignature],
        args: &[TypeSignature],
    ) -> Preference {
        let mut first_better = false;
        let mut second_better = false;
        for ((a, b), arg) in first.iter().zip(second).zip(args) {
            match self.compare_types(a, b, arg) {
                Preference::First => first_better = true,
                Preference::Second => second_better = true,
                Preference::Neither => {}
            }
        }

        match (first_better, second_better) {
            (true, false) => Preference::First,
            (false, true) => Preference::Second,
            _ => Preference::Neither,
        }
    }

    /// Which of two parameter types fits `arg` more closely
    fn compare_types(&self, a: &TypeSignature, b: &TypeSignature, arg: &TypeSignature) -> Preference {
        let (a, b, arg) = (a.unmodified(), b.unmodified(), arg.unmodified());
        if a == b {
            return Preference::Neither;
        }
        if a == arg {
            return Preference::First;
        }
        if b == arg {
            return Preference::Second;
        }

        let a_to_b = self.accepts(b, a);
        let b_to_a = self.accepts(a, b);
        match (a_to_b, b_to_a) {
            (true, false) => Preference::First,
            (false, true) => Preference::Second,
            _ => Preference::Neither,
        }
    }

    fn compare_depth(&self, first: Token, second: Token) -> Preference {
        match self
            .hierarchy
            .depth(first)
            .cmp(&self.hierarchy.depth(second))
        {
            Ordering::Greater => Preference::First,
            Ordering::Less => Preference::Second,
            Ordering::Equal => Preference::Neither,
        }
    }
}

/// Types whose values are object references; value types only get there by boxing
fn is_reference_type(ty: &TypeSignature) -> bool {
    match ty.unmodified() {
        TypeSignature::String
        | TypeSignature::Object
        | TypeSignature::Class(_)
        | TypeSignature::SzArray(_)
        | TypeSignature::Array(_) => true,
        TypeSignature::GenericInst(base, _) => matches!(base.unmodified(), TypeSignature::Class(_)),
        _ => false,
    }
}
