use crate::{
    file::parser::Parser,
    metadata::signatures::{
        CallingConvention, CustomModifiers, SignatureArray, SignatureField,
        SignatureLocalVariable, SignatureLocalVariables, SignatureMethod, SignatureMethodSpec,
        SignatureParameter, SignaturePointer, SignatureProperty, SignatureSzArray,
        SignatureTypeSpec, StandAloneSignature, TypeSignature, ELEMENT_TYPE, SIGNATURE_HEADER,
    },
    Error::RecursionLimit,
    Result,
};

/// Deepest type nesting accepted by the parser and the encoder
pub const MAX_RECURSION_DEPTH: usize = 50;

/// Decoder for the signature grammar stored in `#Blob` entries
pub struct SignatureParser<'a> {
    parser: Parser<'a>,
    depth: usize,
}

impl<'a> SignatureParser<'a> {
    /// A parser positioned at the start of `data`
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        SignatureParser {
            parser: Parser::new(data),
            depth: 0,
        }
    }

    /// Bytes consumed so far
    #[must_use]
    pub fn pos(&self) -> usize {
        self.parser.pos()
    }

    /// Parse one type.
    ///
    /// # Errors
    /// Returns [`crate::Error::RecursionLimit`] beyond [`MAX_RECURSION_DEPTH`] nested types, and a
    /// format error for truncated data or an unknown element type.
    pub fn parse_type(&mut self) -> Result<TypeSignature> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let result = self.parse_type_inner();
        self.depth -= 1;
        result
    }

    fn parse_type_inner(&mut self) -> Result<TypeSignature> {
        let current_byte = self.parser.peek_byte()?;
        if current_byte == ELEMENT_TYPE::CMOD_REQD || current_byte == ELEMENT_TYPE::CMOD_OPT {
            let modifiers = self.parse_custom_mods()?;
            return Ok(TypeSignature::Modified(modifiers, Box::new(self.parse_type()?)));
        }

        self.parser.advance_by(1)?;
        match current_byte {
            ELEMENT_TYPE::VOID => Ok(TypeSignature::Void),
            ELEMENT_TYPE::BOOLEAN => Ok(TypeSignature::Boolean),
            ELEMENT_TYPE::CHAR => Ok(TypeSignature::Char),
            ELEMENT_TYPE::I1 => Ok(TypeSignature::I1),
            ELEMENT_TYPE::U1 => Ok(TypeSignature::U1),
            ELEMENT_TYPE::I2 => Ok(TypeSignature::I2),
            ELEMENT_TYPE::U2 => Ok(TypeSignature::U2),
            ELEMENT_TYPE::I4 => Ok(TypeSignature::I4),
            ELEMENT_TYPE::U4 => Ok(TypeSignature::U4),
            ELEMENT_TYPE::I8 => Ok(TypeSignature::I8),
            ELEMENT_TYPE::U8 => Ok(TypeSignature::U8),
            ELEMENT_TYPE::R4 => Ok(TypeSignature::R4),
            ELEMENT_TYPE::R8 => Ok(TypeSignature::R8),
            ELEMENT_TYPE::STRING => Ok(TypeSignature::String),
            ELEMENT_TYPE::PTR => Ok(TypeSignature::Ptr(SignaturePointer {
                modifiers: self.parse_custom_mods()?,
                base: Box::new(self.parse_type()?),
            })),
            ELEMENT_TYPE::BYREF => Ok(TypeSignature::ByRef(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::VALUETYPE => Ok(TypeSignature::ValueType(
                self.parser.read_compressed_token()?,
            )),
            ELEMENT_TYPE::CLASS => Ok(TypeSignature::Class(self.parser.read_compressed_token()?)),
            ELEMENT_TYPE::VAR => Ok(TypeSignature::GenericParamType(
                self.parser.read_compressed_uint()?,
            )),
            ELEMENT_TYPE::ARRAY => {
                let base = self.parse_type()?;
                let rank = self.parser.read_compressed_uint()?;

                let num_sizes = self.parser.read_compressed_uint()?;
                if num_sizes > rank {
                    return Err(malformed_error!(
                        "ARRAY - {} sizes for rank {}",
                        num_sizes,
                        rank
                    ));
                }
                let mut sizes = Vec::with_capacity(num_sizes as usize);
                for _ in 0..num_sizes {
                    sizes.push(self.parser.read_compressed_uint()?);
                }

                let num_lo_bounds = self.parser.read_compressed_uint()?;
                if num_lo_bounds > rank {
                    return Err(malformed_error!(
                        "ARRAY - {} lower bounds for rank {}",
                        num_lo_bounds,
                        rank
                    ));
                }
                let mut lower_bounds = Vec::with_capacity(num_lo_bounds as usize);
                for _ in 0..num_lo_bounds {
                    lower_bounds.push(self.parser.read_compressed_int()?);
                }

                Ok(TypeSignature::Array(SignatureArray {
                    base: Box::new(base),
                    rank,
                    sizes,
                    lower_bounds,
                }))
            }
            ELEMENT_TYPE::GENERICINST => {
                let peek_byte = self.parser.peek_byte()?;
                if peek_byte != ELEMENT_TYPE::CLASS && peek_byte != ELEMENT_TYPE::VALUETYPE {
                    return Err(malformed_error!(
                        "GENERICINST - Next byte is not TYPE_CLASS or TYPE_VALUE - {}",
                        peek_byte
                    ));
                }

                let base_type = self.parse_type()?;
                let arg_count = self.parser.read_compressed_uint()?;
                if arg_count == 0 {
                    return Err(malformed_error!("GENERICINST - no type arguments"));
                }

                let mut type_args = Vec::with_capacity(self.capacity(arg_count));
                for _ in 0..arg_count {
                    type_args.push(self.parse_type()?);
                }

                Ok(TypeSignature::GenericInst(Box::new(base_type), type_args))
            }
            ELEMENT_TYPE::TYPEDBYREF => Ok(TypeSignature::TypedByRef),
            ELEMENT_TYPE::I => Ok(TypeSignature::I),
            ELEMENT_TYPE::U => Ok(TypeSignature::U),
            ELEMENT_TYPE::FNPTR => Ok(TypeSignature::FnPtr(Box::new(
                self.parse_method_signature()?,
            ))),
            ELEMENT_TYPE::OBJECT => Ok(TypeSignature::Object),
            ELEMENT_TYPE::SZARRAY => Ok(TypeSignature::SzArray(SignatureSzArray {
                modifiers: self.parse_custom_mods()?,
                base: Box::new(self.parse_type()?),
            })),
            ELEMENT_TYPE::MVAR => Ok(TypeSignature::GenericParamMethod(
                self.parser.read_compressed_uint()?,
            )),
            _ => Err(malformed_error!(
                "Unsupported ELEMENT_TYPE - {}",
                current_byte
            )),
        }
    }

    // Counts come from the input, so never pre-allocate more than the remaining bytes could hold
    fn capacity(&self, count: u32) -> usize {
        (count as usize).min(self.parser.remaining())
    }

    fn parse_custom_mods(&mut self) -> Result<CustomModifiers> {
        let mut modifiers = CustomModifiers::new();

        while self.parser.has_more_data() {
            let required = match self.parser.peek_byte()? {
                ELEMENT_TYPE::CMOD_REQD => true,
                ELEMENT_TYPE::CMOD_OPT => false,
                _ => break,
            };

            self.parser.advance_by(1)?;
            modifiers.push(required, self.parser.read_compressed_token()?);
        }

        Ok(modifiers)
    }

    fn parse_param(&mut self) -> Result<SignatureParameter> {
        let modifiers = self.parse_custom_mods()?;

        let mut by_ref = false;
        if self.parser.peek_byte()? == ELEMENT_TYPE::BYREF {
            self.parser.advance_by(1)?;
            by_ref = true;
        }

        Ok(SignatureParameter {
            modifiers,
            by_ref,
            base: self.parse_type()?,
        })
    }

    /// Parse a method signature: `MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig`.
    ///
    /// # Errors
    /// Returns a format error for an unknown calling convention or malformed parameters.
    pub fn parse_method_signature(&mut self) -> Result<SignatureMethod> {
        let header = self.parser.read_le::<u8>()?;
        let Some(calling_convention) = CallingConvention::from_header(header) else {
            return Err(malformed_error!(
                "SignatureMethod - invalid calling convention - 0x{:02X}",
                header
            ));
        };

        let generic_param_count = if header & SIGNATURE_HEADER::GENERIC != 0 {
            self.parser.read_compressed_uint()?
        } else {
            0
        };
        let param_count = self.parser.read_compressed_uint()?;

        let mut method = SignatureMethod {
            has_this: header & SIGNATURE_HEADER::HAS_THIS != 0,
            explicit_this: header & SIGNATURE_HEADER::EXPLICIT_THIS != 0,
            calling_convention,
            generic_param_count,
            return_type: self.parse_param()?,
            params: Vec::with_capacity(self.capacity(param_count)),
            varargs: Vec::new(),
        };

        let mut after_sentinel = false;
        for _ in 0..param_count {
            if self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                if after_sentinel {
                    return Err(malformed_error!("SignatureMethod - second SENTINEL"));
                }
                self.parser.advance_by(1)?;
                after_sentinel = true;
            }

            let param = self.parse_param()?;
            if after_sentinel {
                method.varargs.push(param);
            } else {
                method.params.push(param);
            }
        }

        Ok(method)
    }

    /// Parse a field signature.
    ///
    /// # Errors
    /// Returns a format error if the header is not `FIELD` or the type is malformed.
    pub fn parse_field_signature(&mut self) -> Result<SignatureField> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != SIGNATURE_HEADER::FIELD {
            return Err(malformed_error!(
                "SignatureField - invalid start - {}",
                head_byte
            ));
        }

        Ok(SignatureField {
            modifiers: self.parse_custom_mods()?,
            base: self.parse_type()?,
        })
    }

    /// Parse a property signature.
    ///
    /// # Errors
    /// Returns a format error if the header is not `PROPERTY` or the signature is malformed.
    pub fn parse_property_signature(&mut self) -> Result<SignatureProperty> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte & SIGNATURE_HEADER::CALLING_CONVENTION_MASK != SIGNATURE_HEADER::PROPERTY {
            return Err(malformed_error!(
                "SignatureProperty - invalid start - {}",
                head_byte
            ));
        }

        let param_count = self.parser.read_compressed_uint()?;
        let modifiers = self.parse_custom_mods()?;
        let base = self.parse_type()?;

        let mut params = Vec::with_capacity(self.capacity(param_count));
        for _ in 0..param_count {
            params.push(self.parse_param()?);
        }

        Ok(SignatureProperty {
            has_this: head_byte & SIGNATURE_HEADER::HAS_THIS != 0,
            modifiers,
            base,
            params,
        })
    }

    /// Parse a local variable signature.
    ///
    /// # Errors
    /// Returns a format error if the header is not `LOCAL_SIG` or a local is malformed.
    pub fn parse_local_var_signature(&mut self) -> Result<SignatureLocalVariables> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != SIGNATURE_HEADER::LOCAL_SIG {
            return Err(malformed_error!(
                "SignatureLocalVar - invalid start - {}",
                head_byte
            ));
        }

        let count = self.parser.read_compressed_uint()?;

        let mut locals = Vec::with_capacity(self.capacity(count));
        for _ in 0..count {
            if self.parser.peek_byte()? == ELEMENT_TYPE::TYPEDBYREF {
                self.parser.advance_by(1)?;
                locals.push(SignatureLocalVariable {
                    base: TypeSignature::TypedByRef,
                    ..SignatureLocalVariable::default()
                });
                continue;
            }

            // Modifiers and the PINNED constraint may interleave
            let mut modifiers = CustomModifiers::new();
            let mut is_pinned = false;
            while self.parser.has_more_data() {
                match self.parser.peek_byte()? {
                    ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
                        for (required, token) in self.parse_custom_mods()?.iter() {
                            modifiers.push(required, token);
                        }
                    }
                    ELEMENT_TYPE::PINNED => {
                        self.parser.advance_by(1)?;
                        is_pinned = true;
                    }
                    _ => break,
                }
            }

            let is_byref = if self.parser.peek_byte()? == ELEMENT_TYPE::BYREF {
                self.parser.advance_by(1)?;
                true
            } else {
                false
            };

            locals.push(SignatureLocalVariable {
                modifiers,
                is_pinned,
                is_byref,
                base: self.parse_type()?,
            });
        }

        Ok(SignatureLocalVariables { locals })
    }

    /// Parse a type specification.
    ///
    /// # Errors
    /// Returns a format error if the type is malformed.
    pub fn parse_type_spec_signature(&mut self) -> Result<SignatureTypeSpec> {
        Ok(SignatureTypeSpec {
            base: self.parse_type()?,
        })
    }

    /// Parse a method instantiation.
    ///
    /// # Errors
    /// Returns a format error if the header is not `GENERICINST` or an argument is malformed.
    pub fn parse_method_spec_signature(&mut self) -> Result<SignatureMethodSpec> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != SIGNATURE_HEADER::GENERIC_INST {
            return Err(malformed_error!(
                "SignatureMethodSpec - invalid start - {}",
                head_byte
            ));
        }

        let arg_count = self.parser.read_compressed_uint()?;
        let mut generic_args = Vec::with_capacity(self.capacity(arg_count));
        for _ in 0..arg_count {
            generic_args.push(self.parse_type()?);
        }

        Ok(SignatureMethodSpec { generic_args })
    }

    /// Parse the contents of a `StandAloneSig` row, dispatching on the header byte.
    ///
    /// # Errors
    /// Returns a format error if the signature is malformed.
    pub fn parse_stand_alone_signature(&mut self) -> Result<StandAloneSignature> {
        match self.parser.peek_byte()? {
            SIGNATURE_HEADER::LOCAL_SIG => Ok(StandAloneSignature::LocalVariables(
                self.parse_local_var_signature()?,
            )),
            SIGNATURE_HEADER::FIELD => {
                Ok(StandAloneSignature::Field(self.parse_field_signature()?))
            }
            _ => Ok(StandAloneSignature::Method(self.parse_method_signature()?)),
        }
    }
}
