use crate::{
    file::writer::ByteWriter,
    metadata::{
        signatures::{
            CustomModifiers, SignatureField, SignatureLocalVariables, SignatureMethod,
            SignatureMethodSpec, SignatureParameter, SignatureProperty, SignatureTypeSpec,
            StandAloneSignature, TypeSignature, ELEMENT_TYPE, MAX_RECURSION_DEPTH,
            SIGNATURE_HEADER,
        },
        token::Token,
    },
    Error, Result,
};

/// Encoder for the signature grammar; the counterpart of [`super::SignatureParser`]
#[derive(Debug, Default)]
pub struct SignatureEncoder {
    writer: ByteWriter,
    depth: usize,
}

impl SignatureEncoder {
    /// An empty encoder
    #[must_use]
    pub fn new() -> Self {
        SignatureEncoder::default()
    }

    /// The encoded bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }

    fn write_token(&mut self, token: Token) -> Result<()> {
        if token.is_pseudo() {
            return Err(Error::UnresolvedPseudoToken(token));
        }
        self.writer.write_compressed_token(token)
    }

    fn write_custom_mods(&mut self, modifiers: &CustomModifiers) -> Result<()> {
        for (required, token) in modifiers.iter() {
            self.writer.write_le(if required {
                ELEMENT_TYPE::CMOD_REQD
            } else {
                ELEMENT_TYPE::CMOD_OPT
            });
            self.write_token(token)?;
        }
        Ok(())
    }

    fn write_count(&mut self, count: usize) -> Result<()> {
        let Ok(count) = u32::try_from(count) else {
            return Err(limit_error!("signature element count", count, u32::MAX));
        };
        self.writer.write_compressed_uint(count)
    }

    /// Append one type.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedPseudoToken`] for a pseudo-token, [`Error::InvalidToken`] for a
    /// type token outside TypeDef, TypeRef and TypeSpec, and [`Error::RecursionLimit`] beyond
    /// [`MAX_RECURSION_DEPTH`] nested types.
    pub fn encode_type(&mut self, signature: &TypeSignature) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            return Err(Error::RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let result = self.encode_type_inner(signature);
        self.depth -= 1;
        result
    }

    fn encode_type_inner(&mut self, signature: &TypeSignature) -> Result<()> {
        let simple = match signature {
            TypeSignature::Void => Some(ELEMENT_TYPE::VOID),
            TypeSignature::Boolean => Some(ELEMENT_TYPE::BOOLEAN),
            TypeSignature::Char => Some(ELEMENT_TYPE::CHAR),
            TypeSignature::I1 => Some(ELEMENT_TYPE::I1),
            TypeSignature::U1 => Some(ELEMENT_TYPE::U1),
            TypeSignature::I2 => Some(ELEMENT_TYPE::I2),
            TypeSignature::U2 => Some(ELEMENT_TYPE::U2),
            TypeSignature::I4 => Some(ELEMENT_TYPE::I4),
            TypeSignature::U4 => Some(ELEMENT_TYPE::U4),
            TypeSignature::I8 => Some(ELEMENT_TYPE::I8),
            TypeSignature::U8 => Some(ELEMENT_TYPE::U8),
            TypeSignature::R4 => Some(ELEMENT_TYPE::R4),
            TypeSignature::R8 => Some(ELEMENT_TYPE::R8),
            TypeSignature::String => Some(ELEMENT_TYPE::STRING),
            TypeSignature::TypedByRef => Some(ELEMENT_TYPE::TYPEDBYREF),
            TypeSignature::I => Some(ELEMENT_TYPE::I),
            TypeSignature::U => Some(ELEMENT_TYPE::U),
            TypeSignature::Object => Some(ELEMENT_TYPE::OBJECT),
            _ => None,
        };
        if let Some(element_type) = simple {
            self.writer.write_le(element_type);
            return Ok(());
        }

        match signature {
            TypeSignature::Unknown => {
                return Err(malformed_error!("Cannot encode an unknown type"));
            }
            TypeSignature::Ptr(pointer) => {
                self.writer.write_le(ELEMENT_TYPE::PTR);
                self.write_custom_mods(&pointer.modifiers)?;
                self.encode_type(&pointer.base)?;
            }
            TypeSignature::ByRef(inner) => {
                self.writer.write_le(ELEMENT_TYPE::BYREF);
                self.encode_type(inner)?;
            }
            TypeSignature::ValueType(token) => {
                self.writer.write_le(ELEMENT_TYPE::VALUETYPE);
                self.write_token(*token)?;
            }
            TypeSignature::Class(token) => {
                self.writer.write_le(ELEMENT_TYPE::CLASS);
                self.write_token(*token)?;
            }
            TypeSignature::GenericParamType(number) => {
                self.writer.write_le(ELEMENT_TYPE::VAR);
                self.writer.write_compressed_uint(*number)?;
            }
            TypeSignature::GenericParamMethod(number) => {
                self.writer.write_le(ELEMENT_TYPE::MVAR);
                self.writer.write_compressed_uint(*number)?;
            }
            TypeSignature::Array(array) => {
                if array.sizes.len() > array.rank as usize
                    || array.lower_bounds.len() > array.rank as usize
                {
                    return Err(malformed_error!(
                        "Array shape describes more dimensions than its rank {}",
                        array.rank
                    ));
                }

                self.writer.write_le(ELEMENT_TYPE::ARRAY);
                self.encode_type(&array.base)?;
                self.writer.write_compressed_uint(array.rank)?;
                self.write_count(array.sizes.len())?;
                for size in &array.sizes {
                    self.writer.write_compressed_uint(*size)?;
                }
                self.write_count(array.lower_bounds.len())?;
                for bound in &array.lower_bounds {
                    self.writer.write_compressed_int(*bound)?;
                }
            }
            TypeSignature::GenericInst(base, args) => {
                if !matches!(
                    base.as_ref(),
                    TypeSignature::Class(_) | TypeSignature::ValueType(_)
                ) {
                    return Err(malformed_error!(
                        "Generic instance base must be a class or value type"
                    ));
                }
                if args.is_empty() {
                    return Err(malformed_error!("Generic instance without type arguments"));
                }

                self.writer.write_le(ELEMENT_TYPE::GENERICINST);
                self.encode_type(base)?;
                self.write_count(args.len())?;
                for arg in args {
                    self.encode_type(arg)?;
                }
            }
            TypeSignature::FnPtr(method) => {
                self.writer.write_le(ELEMENT_TYPE::FNPTR);
                self.encode_method(method)?;
            }
            TypeSignature::SzArray(array) => {
                self.writer.write_le(ELEMENT_TYPE::SZARRAY);
                self.write_custom_mods(&array.modifiers)?;
                self.encode_type(&array.base)?;
            }
            TypeSignature::Modified(modifiers, inner) => {
                self.write_custom_mods(modifiers)?;
                self.encode_type(inner)?;
            }
            _ => {}
        }

        Ok(())
    }

    fn encode_param(&mut self, param: &SignatureParameter) -> Result<()> {
        self.write_custom_mods(&param.modifiers)?;
        if param.by_ref {
            self.writer.write_le(ELEMENT_TYPE::BYREF);
        }
        self.encode_type(&param.base)
    }

    /// Append a method signature.
    ///
    /// # Errors
    /// See [`SignatureEncoder::encode_type`].
    pub fn encode_method(&mut self, method: &SignatureMethod) -> Result<()> {
        let mut header = method.calling_convention as u8;
        if method.has_this {
            header |= SIGNATURE_HEADER::HAS_THIS;
        }
        if method.explicit_this {
            header |= SIGNATURE_HEADER::EXPLICIT_THIS;
        }
        if method.generic_param_count > 0 {
            header |= SIGNATURE_HEADER::GENERIC;
        }

        self.writer.write_le(header);
        if method.generic_param_count > 0 {
            self.writer.write_compressed_uint(method.generic_param_count)?;
        }
        self.write_count(method.params.len() + method.varargs.len())?;
        self.encode_param(&method.return_type)?;
        for param in &method.params {
            self.encode_param(param)?;
        }
        if !method.varargs.is_empty() {
            self.writer.write_le(ELEMENT_TYPE::SENTINEL);
            for param in &method.varargs {
                self.encode_param(param)?;
            }
        }

        Ok(())
    }

    /// Append a field signature.
    ///
    /// # Errors
    /// See [`SignatureEncoder::encode_type`].
    pub fn encode_field(&mut self, field: &SignatureField) -> Result<()> {
        self.writer.write_le(SIGNATURE_HEADER::FIELD);
        self.write_custom_mods(&field.modifiers)?;
        self.encode_type(&field.base)
    }

    /// Append a property signature.
    ///
    /// # Errors
    /// See [`SignatureEncoder::encode_type`].
    pub fn encode_property(&mut self, property: &SignatureProperty) -> Result<()> {
        let mut header = SIGNATURE_HEADER::PROPERTY;
        if property.has_this {
            header |= SIGNATURE_HEADER::HAS_THIS;
        }

        self.writer.write_le(header);
        self.write_count(property.params.len())?;
        self.write_custom_mods(&property.modifiers)?;
        self.encode_type(&property.base)?;
        for param in &property.params {
            self.encode_param(param)?;
        }

        Ok(())
    }

    /// Append a local variable signature. Modifiers are written before the `PINNED` constraint.
    ///
    /// # Errors
    /// See [`SignatureEncoder::encode_type`].
    pub fn encode_locals(&mut self, locals: &SignatureLocalVariables) -> Result<()> {
        self.writer.write_le(SIGNATURE_HEADER::LOCAL_SIG);
        self.write_count(locals.locals.len())?;
        for local in &locals.locals {
            self.write_custom_mods(&local.modifiers)?;
            if local.is_pinned {
                self.writer.write_le(ELEMENT_TYPE::PINNED);
            }
            if local.is_byref {
                self.writer.write_le(ELEMENT_TYPE::BYREF);
            }
            self.encode_type(&local.base)?;
        }

        Ok(())
    }

    /// Append a type specification.
    ///
    /// # Errors
    /// See [`SignatureEncoder::encode_type`].
    pub fn encode_type_spec(&mut self, spec: &SignatureTypeSpec) -> Result<()> {
        self.encode_type(&spec.base)
    }

    /// Append a method instantiation.
    ///
    /// # Errors
    /// See [`SignatureEncoder::encode_type`].
    pub fn encode_method_spec(&mut self, spec: &SignatureMethodSpec) -> Result<()> {
        self.writer.write_le(SIGNATURE_HEADER::GENERIC_INST);
        self.write_count(spec.generic_args.len())?;
        for arg in &spec.generic_args {
            self.encode_type(arg)?;
        }

        Ok(())
    }

    /// Append the contents of a `StandAloneSig` row.
    ///
    /// # Errors
    /// See [`SignatureEncoder::encode_type`].
    pub fn encode_stand_alone(&mut self, signature: &StandAloneSignature) -> Result<()> {
        match signature {
            StandAloneSignature::LocalVariables(locals) => self.encode_locals(locals),
            StandAloneSignature::Method(method) => self.encode_method(method),
            StandAloneSignature::Field(field) => self.encode_field(field),
        }
    }
}
