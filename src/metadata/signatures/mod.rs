//! Signature codec (ECMA-335 II.23.2).
//!
//! Signatures are the compact, tag-driven descriptions of types, fields, methods, properties and
//! locals stored in `#Blob` entries. [`SignatureParser`] decodes them into the model in this
//! module and [`SignatureEncoder`] writes the model back. A parsed signature re-encodes to the
//! same bytes.
//!
//! Custom modifiers are kept as ordered runs ([`CustomModifiers`]); see [`ModifierProjection`]
//! for how they split into required and optional groups.
//!
//! # Examples
//!
//! ```rust
//! use cilmeta::metadata::signatures::{encode_method_signature, parse_method_signature, TypeSignature};
//!
//! // instance void M(int32, string)
//! let blob = [0x20, 0x02, 0x01, 0x08, 0x0E];
//! let method = parse_method_signature(&blob)?;
//! assert!(method.has_this);
//! assert_eq!(method.params[1].base, TypeSignature::String);
//!
//! assert_eq!(encode_method_signature(&method)?, blob);
//! # Ok::<(), cilmeta::Error>(())
//! ```

mod encoder;
mod modifiers;
mod parser;
mod types;

pub use encoder::SignatureEncoder;
pub use modifiers::{CustomModifiers, ModifierEntry, ModifierProjection};
pub use parser::{SignatureParser, MAX_RECURSION_DEPTH};
pub use types::*;

use crate::Result;

/// Parse a method signature.
///
/// # Errors
/// Returns an error if the signature data is malformed.
pub fn parse_method_signature(data: &[u8]) -> Result<SignatureMethod> {
    SignatureParser::new(data).parse_method_signature()
}

/// Parse a field signature.
///
/// # Errors
/// Returns an error if the signature data is malformed.
pub fn parse_field_signature(data: &[u8]) -> Result<SignatureField> {
    SignatureParser::new(data).parse_field_signature()
}

/// Parse a property signature.
///
/// # Errors
/// Returns an error if the signature data is malformed.
pub fn parse_property_signature(data: &[u8]) -> Result<SignatureProperty> {
    SignatureParser::new(data).parse_property_signature()
}

/// Parse a local variable signature.
///
/// # Errors
/// Returns an error if the signature data is malformed.
pub fn parse_local_var_signature(data: &[u8]) -> Result<SignatureLocalVariables> {
    SignatureParser::new(data).parse_local_var_signature()
}

/// Parse a type specification.
///
/// # Errors
/// Returns an error if the signature data is malformed.
pub fn parse_type_spec_signature(data: &[u8]) -> Result<SignatureTypeSpec> {
    SignatureParser::new(data).parse_type_spec_signature()
}

/// Parse a method instantiation.
///
/// # Errors
/// Returns an error if the signature data is malformed.
pub fn parse_method_spec_signature(data: &[u8]) -> Result<SignatureMethodSpec> {
    SignatureParser::new(data).parse_method_spec_signature()
}

/// Parse the contents of a `StandAloneSig` row.
///
/// # Errors
/// Returns an error if the signature data is malformed.
pub fn parse_stand_alone_signature(data: &[u8]) -> Result<StandAloneSignature> {
    SignatureParser::new(data).parse_stand_alone_signature()
}

/// Encode a method signature.
///
/// # Errors
/// Returns an error for pseudo-tokens, invalid type tokens or an unencodable shape.
pub fn encode_method_signature(method: &SignatureMethod) -> Result<Vec<u8>> {
    let mut encoder = SignatureEncoder::new();
    encoder.encode_method(method)?;
    Ok(encoder.into_bytes())
}

/// Encode a field signature.
///
/// # Errors
/// See [`encode_method_signature`].
pub fn encode_field_signature(field: &SignatureField) -> Result<Vec<u8>> {
    let mut encoder = SignatureEncoder::new();
    encoder.encode_field(field)?;
    Ok(encoder.into_bytes())
}

/// Encode a property signature.
///
/// # Errors
/// See [`encode_method_signature`].
pub fn encode_property_signature(property: &SignatureProperty) -> Result<Vec<u8>> {
    let mut encoder = SignatureEncoder::new();
    encoder.encode_property(property)?;
    Ok(encoder.into_bytes())
}

/// Encode a local variable signature.
///
/// # Errors
/// See [`encode_method_signature`].
pub fn encode_local_var_signature(locals: &SignatureLocalVariables) -> Result<Vec<u8>> {
    let mut encoder = SignatureEncoder::new();
    encoder.encode_locals(locals)?;
    Ok(encoder.into_bytes())
}

/// Encode a type specification.
///
/// # Errors
/// See [`encode_method_signature`].
pub fn encode_type_spec_signature(spec: &SignatureTypeSpec) -> Result<Vec<u8>> {
    let mut encoder = SignatureEncoder::new();
    encoder.encode_type_spec(spec)?;
    Ok(encoder.into_bytes())
}

/// Encode a method instantiation.
///
/// # Errors
/// See [`encode_method_signature`].
pub fn encode_method_spec_signature(spec: &SignatureMethodSpec) -> Result<Vec<u8>> {
    let mut encoder = SignatureEncoder::new();
    encoder.encode_method_spec(spec)?;
    Ok(encoder.into_bytes())
}

/// Encode the contents of a `StandAloneSig` row.
///
/// # Errors
/// See [`encode_method_signature`].
pub fn encode_stand_alone_signature(signature: &StandAloneSignature) -> Result<Vec<u8>> {
    let mut encoder = SignatureEncoder::new();
    encoder.encode_stand_alone(signature)?;
    Ok(encoder.into_bytes())
}
