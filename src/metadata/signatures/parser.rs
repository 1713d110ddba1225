use crate::{
    file::parser::Parser,
    metadata::{
        signatures::{
            ArrayDimension, CallingConvention, FieldSignature, GenericParameterKind, GenericScope,
            LocalVariables, MethodSignature, MethodSpecSignature, ModifierKind, PrimitiveType,
            PropertySignature, TypeExpression, ELEMENT_TYPE, SIGNATURE_FLAGS, SIGNATURE_KIND,
        },
        tables::TableInfo,
        token::Token,
    },
    Error::{NotSupported, RecursionLimit},
    Result,
};

/// Default maximum nesting depth of a decoded type
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Highest array rank the decoder accepts
pub const MAX_ARRAY_RANK: u32 = 32;

/// Recursive descent decoder for the signature blobs of ECMA-335 II.23.2.
///
/// One parser decodes one signature. `VAR` and `MVAR` are resolved against the
/// [`GenericScope`] given at construction.
///
/// # Example
///
/// ```rust
/// use clrmap::metadata::signatures::{GenericScope, SignatureParser};
///
/// let scope = GenericScope::none();
/// let mut parser = SignatureParser::new(&[0x20, 0x01, 0x01, 0x0E], &scope);
/// let signature = parser.parse_method_signature()?;
/// assert!(signature.has_this);
/// assert_eq!(signature.params.len(), 1);
/// # Ok::<(), clrmap::Error>(())
/// ```
pub struct SignatureParser<'a, 's> {
    parser: Parser<'a>,
    scope: &'s GenericScope,
    tables: Option<&'s TableInfo>,
    depth: usize,
    max_depth: usize,
}

impl<'a, 's> SignatureParser<'a, 's> {
    /// Create a parser over the bytes of one signature blob
    #[must_use]
    pub fn new(data: &'a [u8], scope: &'s GenericScope) -> Self {
        SignatureParser {
            parser: Parser::new(data),
            scope,
            tables: None,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit the nesting depth of decoded types
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Require every type token to reference an existing row of `tables`
    #[must_use]
    pub fn with_token_check(mut self, tables: &'s TableInfo) -> Self {
        self.tables = Some(tables);
        self
    }

    /// Parse a `MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig`.
    ///
    /// Parameters that follow a `SENTINEL` land in [`MethodSignature::varargs`].
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for an unknown calling convention and
    /// [`crate::Error::Malformed`] for a misplaced `SENTINEL`.
    pub fn parse_method_signature(&mut self) -> Result<MethodSignature> {
        let head = self.parser.read_le::<u8>()?;
        let Some(calling_convention) =
            CallingConvention::from_repr(head & SIGNATURE_FLAGS::CONVENTION_MASK)
        else {
            return Err(NotSupported(format!(
                "Calling convention {:#04x}",
                head & SIGNATURE_FLAGS::CONVENTION_MASK
            )));
        };

        let generic_param_count = if calling_convention == CallingConvention::Generic {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let param_count = self.parser.read_compressed_uint()?;
        let return_type = self.parse_type()?;

        let mut params = Vec::with_capacity(self.capacity(param_count));
        let mut varargs = Vec::new();
        let mut in_varargs = false;
        for _ in 0..param_count {
            if self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                if in_varargs
                    || !matches!(
                        calling_convention,
                        CallingConvention::VarArg | CallingConvention::C
                    )
                {
                    return Err(malformed_error!(
                        "Unexpected SENTINEL at {}",
                        self.parser.pos()
                    ));
                }
                self.parser.advance_by(1)?;
                in_varargs = true;
            }

            let param = self.parse_type()?;
            if in_varargs {
                varargs.push(param);
            } else {
                params.push(param);
            }
        }

        Ok(MethodSignature {
            has_this: head & SIGNATURE_FLAGS::HASTHIS != 0,
            explicit_this: head & SIGNATURE_FLAGS::EXPLICITTHIS != 0,
            calling_convention,
            generic_param_count,
            return_type,
            params,
            varargs,
        })
    }

    /// Parse a `FieldSig`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the blob does not start with `FIELD`.
    pub fn parse_field_signature(&mut self) -> Result<FieldSignature> {
        self.expect_head(SIGNATURE_KIND::FIELD, "FieldSig")?;
        Ok(FieldSignature {
            ty: self.parse_type()?,
        })
    }

    /// Parse a `PropertySig`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the blob does not start with `PROPERTY`.
    pub fn parse_property_signature(&mut self) -> Result<PropertySignature> {
        let head = self.parser.read_le::<u8>()?;
        if head & !SIGNATURE_FLAGS::HASTHIS != SIGNATURE_KIND::PROPERTY {
            return Err(malformed_error!("PropertySig - invalid start - {:#04x}", head));
        }

        let param_count = self.parser.read_compressed_uint()?;
        let ty = self.parse_type()?;
        let mut params = Vec::with_capacity(self.capacity(param_count));
        for _ in 0..param_count {
            params.push(self.parse_type()?);
        }

        Ok(PropertySignature {
            has_this: head & SIGNATURE_FLAGS::HASTHIS != 0,
            ty,
            params,
        })
    }

    /// Parse a `LocalVarSig`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the blob does not start with `LOCAL_SIG`.
    pub fn parse_local_var_signature(&mut self) -> Result<LocalVariables> {
        self.expect_head(SIGNATURE_KIND::LOCAL_SIG, "LocalVarSig")?;

        let count = self.parser.read_compressed_uint()?;
        let mut locals = Vec::with_capacity(self.capacity(count));
        for _ in 0..count {
            locals.push(self.parse_type()?);
        }

        Ok(LocalVariables { locals })
    }

    /// Parse the blob of a `TypeSpec` row.
    ///
    /// # Errors
    /// Returns an error if the type cannot be decoded.
    pub fn parse_type_spec_signature(&mut self) -> Result<TypeExpression> {
        self.parse_type()
    }

    /// Parse the instantiation blob of a `MethodSpec` row.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the blob does not start with `GENERICINST` or
    /// declares no arguments.
    pub fn parse_method_spec_signature(&mut self) -> Result<MethodSpecSignature> {
        self.expect_head(SIGNATURE_KIND::GENERICINST, "MethodSpec")?;

        let count = self.parser.read_compressed_uint()?;
        if count == 0 {
            return Err(malformed_error!("MethodSpec without arguments"));
        }

        let mut arguments = Vec::with_capacity(self.capacity(count));
        for _ in 0..count {
            arguments.push(self.parse_type()?);
        }

        Ok(MethodSpecSignature { arguments })
    }

    /// Parse a single type.
    ///
    /// # Errors
    /// Returns [`crate::Error::RecursionLimit`] when nesting exceeds the configured depth,
    /// [`crate::Error::NotSupported`] for an element type outside the grammar and
    /// [`crate::Error::Malformed`] for an invalid construct.
    pub fn parse_type(&mut self) -> Result<TypeExpression> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(RecursionLimit(self.max_depth));
        }

        let result = self.parse_element();
        self.depth -= 1;
        result
    }

    fn parse_element(&mut self) -> Result<TypeExpression> {
        let element = self.parser.read_le::<u8>()?;
        if let Some(primitive) = PrimitiveType::from_element_type(element) {
            return Ok(TypeExpression::Primitive(primitive));
        }

        match element {
            ELEMENT_TYPE::CLASS | ELEMENT_TYPE::VALUETYPE => Ok(TypeExpression::ClassOrValueType {
                token: self.read_type_token()?,
                is_value_type: element == ELEMENT_TYPE::VALUETYPE,
            }),
            ELEMENT_TYPE::PTR => Ok(TypeExpression::Pointer(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::BYREF => Ok(TypeExpression::ByRef(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::PINNED => Ok(TypeExpression::Pinned(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::SZARRAY => Ok(TypeExpression::Vector(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::ARRAY => self.parse_array(),
            ELEMENT_TYPE::GENERICINST => self.parse_generic_instance(),
            ELEMENT_TYPE::VAR => Ok(TypeExpression::GenericParameter(self.scope.resolve(
                GenericParameterKind::Type,
                self.parser.read_compressed_uint()?,
            )?)),
            ELEMENT_TYPE::MVAR => Ok(TypeExpression::GenericParameter(self.scope.resolve(
                GenericParameterKind::Method,
                self.parser.read_compressed_uint()?,
            )?)),
            ELEMENT_TYPE::CMOD_OPT | ELEMENT_TYPE::CMOD_REQD => {
                let kind = if element == ELEMENT_TYPE::CMOD_OPT {
                    ModifierKind::Optional
                } else {
                    ModifierKind::Required
                };
                let modifier = self.read_type_token()?;
                Ok(TypeExpression::Modified {
                    kind,
                    modifier,
                    base: Box::new(self.parse_type()?),
                })
            }
            ELEMENT_TYPE::FNPTR => Ok(TypeExpression::FunctionPointer(Box::new(
                self.parse_method_signature()?,
            ))),
            ELEMENT_TYPE::SENTINEL | ELEMENT_TYPE::END => Err(malformed_error!(
                "Element type {:#04x} outside of its context at {}",
                element,
                self.parser.pos() - 1
            )),
            _ => Err(NotSupported(format!("ELEMENT_TYPE {:#04x}", element))),
        }
    }

    /// `ARRAY Type Rank NumSizes Size* NumLoBounds LoBound*`
    ///
    /// Sizes and lower bounds cover the leading dimensions only. The remaining dimensions are
    /// unbounded; a sized dimension without an explicit lower bound starts at 0.
    fn parse_array(&mut self) -> Result<TypeExpression> {
        let base = self.parse_type()?;

        let rank = self.parser.read_compressed_uint()?;
        if rank == 0 || rank > MAX_ARRAY_RANK {
            return Err(malformed_error!("Invalid array rank - {}", rank));
        }

        let size_count = self.parser.read_compressed_uint()?;
        if size_count > rank {
            return Err(malformed_error!(
                "Array of rank {} declares {} sizes",
                rank,
                size_count
            ));
        }
        let mut sizes = Vec::with_capacity(size_count as usize);
        for _ in 0..size_count {
            sizes.push(self.parser.read_compressed_uint()?);
        }

        let bound_count = self.parser.read_compressed_uint()?;
        if bound_count > rank {
            return Err(malformed_error!(
                "Array of rank {} declares {} lower bounds",
                rank,
                bound_count
            ));
        }
        let mut bounds = Vec::with_capacity(bound_count as usize);
        for _ in 0..bound_count {
            bounds.push(self.parser.read_compressed_int()?);
        }

        let mut dimensions = Vec::with_capacity(rank as usize);
        for index in 0..rank as usize {
            let size = sizes.get(index).copied();
            let lower_bound = bounds
                .get(index)
                .copied()
                .or(size.map(|_| 0));

            let upper_bound = match (lower_bound, size) {
                (Some(lower), Some(size)) => {
                    let upper = i64::from(lower) + i64::from(size) - 1;
                    Some(i32::try_from(upper).map_err(|_| {
                        malformed_error!("Array dimension {} overflows - {}+{}", index, lower, size)
                    })?)
                }
                _ => None,
            };

            dimensions.push(ArrayDimension {
                lower_bound,
                upper_bound,
            });
        }

        Ok(TypeExpression::Array {
            base: Box::new(base),
            dimensions,
        })
    }

    /// `GENERICINST (CLASS | VALUETYPE) TypeDefOrRefOrSpecEncoded GenArgCount Type*`
    fn parse_generic_instance(&mut self) -> Result<TypeExpression> {
        let next = self.parser.peek_byte()?;
        if next != ELEMENT_TYPE::CLASS && next != ELEMENT_TYPE::VALUETYPE {
            return Err(malformed_error!(
                "GENERICINST - Next byte is not CLASS or VALUETYPE - {:#04x}",
                next
            ));
        }

        let base = self.parse_type()?;
        let count = self.parser.read_compressed_uint()?;
        if count == 0 {
            return Err(malformed_error!("GENERICINST without arguments"));
        }

        let mut arguments = Vec::with_capacity(self.capacity(count));
        for _ in 0..count {
            arguments.push(self.parse_type()?);
        }

        Ok(TypeExpression::GenericInstance {
            base: Box::new(base),
            arguments,
        })
    }

    fn read_type_token(&mut self) -> Result<Token> {
        let token = self.parser.read_compressed_token()?;
        if let Some(tables) = self.tables {
            let exists = token
                .table()
                .is_some_and(|table| token.rid() != 0 && token.rid() <= tables.rows(table));
            if !exists {
                return Err(out_of_bounds_error!());
            }
        }

        Ok(token)
    }

    fn expect_head(&mut self, expected: u8, what: &str) -> Result<()> {
        let head = self.parser.read_le::<u8>()?;
        if head != expected {
            return Err(malformed_error!("{} - invalid start - {:#04x}", what, head));
        }
        Ok(())
    }

    /// Every element takes at least one byte, so a count never needs more slots than bytes left
    fn capacity(&self, count: u32) -> usize {
        (count as usize).min(self.parser.remaining())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::tables::{HeapSizes, TableId},
        Error,
    };

    fn parse_type(data: &[u8]) -> Result<TypeExpression> {
        let scope = GenericScope::open();
        SignatureParser::new(data, &scope).parse_type()
    }

    fn i4() -> TypeExpression {
        TypeExpression::Primitive(PrimitiveType::I4)
    }

    #[test]
    fn primitives() {
        let cases = [
            (0x01, PrimitiveType::Void),
            (0x02, PrimitiveType::Boolean),
            (0x08, PrimitiveType::I4),
            (0x0E, PrimitiveType::String),
            (0x16, PrimitiveType::TypedByRef),
            (0x18, PrimitiveType::I),
            (0x1C, PrimitiveType::Object),
        ];

        for (byte, expected) in cases {
            assert_eq!(
                parse_type(&[byte]).unwrap(),
                TypeExpression::Primitive(expected)
            );
        }
    }

    #[test]
    fn class_and_valuetype() {
        assert_eq!(
            parse_type(&[0x12, 0x42]).unwrap(),
            TypeExpression::ClassOrValueType {
                token: Token::new(0x1B00_0010),
                is_value_type: false,
            }
        );
        assert_eq!(
            parse_type(&[0x11, 0x35]).unwrap(),
            TypeExpression::ClassOrValueType {
                token: Token::new(0x0100_000D),
                is_value_type: true,
            }
        );
    }

    #[test]
    fn array_dimensions() {
        // int32[5, , ]
        let array = parse_type(&[0x14, 0x08, 0x03, 0x01, 0x05, 0x00]).unwrap();
        let TypeExpression::Array { base, dimensions } = array else {
            panic!("not an array");
        };
        assert_eq!(*base, i4());
        assert_eq!(
            dimensions,
            vec![
                ArrayDimension {
                    lower_bound: Some(0),
                    upper_bound: Some(4)
                },
                ArrayDimension::default(),
                ArrayDimension::default(),
            ]
        );

        // int32[-1...2, 3...]
        let array = parse_type(&[0x14, 0x08, 0x02, 0x01, 0x04, 0x02, 0x7F, 0x06]).unwrap();
        let TypeExpression::Array { dimensions, .. } = array else {
            panic!("not an array");
        };
        assert_eq!(dimensions[0].lower_bound, Some(-1));
        assert_eq!(dimensions[0].upper_bound, Some(2));
        assert_eq!(dimensions[1].lower_bound, Some(3));
        assert_eq!(dimensions[1].upper_bound, None);
    }

    #[test]
    fn array_invalid() {
        assert!(matches!(
            parse_type(&[0x14, 0x08, 0x01, 0x02, 0x05, 0x05, 0x00]),
            Err(Error::Malformed { .. })
        ));
        assert!(parse_type(&[0x14, 0x08, 0x00, 0x00, 0x00]).is_err());
    }

    #[test]
    fn generic_instance() {
        // Dictionary<string, int32>
        let ty = parse_type(&[0x15, 0x12, 0x2A, 0x02, 0x0E, 0x08]).unwrap();
        let TypeExpression::GenericInstance { base, arguments } = ty else {
            panic!("not a generic instance");
        };
        assert!(matches!(
            *base,
            TypeExpression::ClassOrValueType {
                is_value_type: false,
                ..
            }
        ));
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[1], i4());

        assert!(matches!(
            parse_type(&[0x15, 0x08, 0x01, 0x08]),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn wrappers() {
        assert_eq!(
            parse_type(&[0x0F, 0x08]).unwrap(),
            TypeExpression::Pointer(Box::new(i4()))
        );
        assert_eq!(
            parse_type(&[0x10, 0x1D, 0x08]).unwrap(),
            TypeExpression::ByRef(Box::new(TypeExpression::Vector(Box::new(i4()))))
        );

        // modreq(IsVolatile) int32
        let modified = parse_type(&[0x1F, 0x49, 0x08]).unwrap();
        assert_eq!(
            modified,
            TypeExpression::Modified {
                kind: ModifierKind::Required,
                modifier: Token::new(0x0100_0012),
                base: Box::new(i4()),
            }
        );
        assert_eq!(modified.unmodified(), &i4());
    }

    #[test]
    fn method_signature() {
        // instance !!0 Method<T>(!0&, int32[])
        let data = [
            0x30, 0x01, 0x02, 0x1E, 0x00, 0x10, 0x13, 0x00, 0x1D, 0x08,
        ];
        let scope = GenericScope::open();
        let signature = SignatureParser::new(&data, &scope)
            .parse_method_signature()
            .unwrap();

        assert!(signature.has_this);
        assert!(!signature.explicit_this);
        assert_eq!(signature.calling_convention, CallingConvention::Generic);
        assert_eq!(signature.generic_param_count, 1);
        assert!(matches!(
            signature.return_type,
            TypeExpression::GenericParameter(param) if param.kind == GenericParameterKind::Method
        ));
        assert_eq!(signature.params.len(), 2);
        assert!(matches!(signature.params[0], TypeExpression::ByRef(_)));
        assert!(signature.varargs.is_empty());
    }

    #[test]
    fn varargs() {
        // vararg void (int32, ..., string)
        let data = [0x05, 0x02, 0x01, 0x08, 0x41, 0x0E];
        let scope = GenericScope::none();
        let signature = SignatureParser::new(&data, &scope)
            .parse_method_signature()
            .unwrap();

        assert_eq!(signature.calling_convention, CallingConvention::VarArg);
        assert_eq!(signature.params, vec![i4()]);
        assert_eq!(
            signature.varargs,
            vec![TypeExpression::Primitive(PrimitiveType::String)]
        );

        let data = [0x00, 0x02, 0x01, 0x08, 0x41, 0x0E];
        assert!(SignatureParser::new(&data, &scope)
            .parse_method_signature()
            .is_err());
    }

    #[test]
    fn other_kinds() {
        let scope = GenericScope::none();

        let field = SignatureParser::new(&[0x06, 0x1D, 0x0E], &scope)
            .parse_field_signature()
            .unwrap();
        assert!(matches!(field.ty, TypeExpression::Vector(_)));
        assert!(SignatureParser::new(&[0x07, 0x08], &scope)
            .parse_field_signature()
            .is_err());

        let property = SignatureParser::new(&[0x28, 0x01, 0x08, 0x0E], &scope)
            .parse_property_signature()
            .unwrap();
        assert!(property.has_this);
        assert_eq!(property.ty, i4());
        assert_eq!(property.params.len(), 1);

        let locals = SignatureParser::new(&[0x07, 0x03, 0x45, 0x10, 0x08, 0x16, 0x0E], &scope)
            .parse_local_var_signature()
            .unwrap();
        assert_eq!(
            locals.locals[0],
            TypeExpression::Pinned(Box::new(TypeExpression::ByRef(Box::new(i4()))))
        );
        assert_eq!(
            locals.locals[1],
            TypeExpression::Primitive(PrimitiveType::TypedByRef)
        );

        let spec = SignatureParser::new(&[0x0A, 0x01, 0x08], &scope)
            .parse_method_spec_signature()
            .unwrap();
        assert_eq!(spec.arguments, vec![i4()]);
        assert!(SignatureParser::new(&[0x0A, 0x00], &scope)
            .parse_method_spec_signature()
            .is_err());
    }

    #[test]
    fn unsupported() {
        assert!(matches!(
            parse_type(&[0x21]),
            Err(Error::NotSupported(_))
        ));
        assert!(matches!(
            parse_type(&[0x41]),
            Err(Error::Malformed { .. })
        ));

        let scope = GenericScope::none();
        assert!(matches!(
            SignatureParser::new(&[0x0B, 0x00, 0x01], &scope).parse_method_signature(),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn scope_mismatch() {
        let scope = GenericScope::none().with_type_params(vec![Token::new(0x2A00_0001)]);
        assert!(SignatureParser::new(&[0x13, 0x00], &scope)
            .parse_type()
            .is_ok());
        assert!(matches!(
            SignatureParser::new(&[0x1E, 0x00], &scope).parse_type(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn recursion_limit() {
        let mut data = vec![0x0F; 100];
        data.push(0x08);
        assert!(matches!(parse_type(&data), Err(Error::RecursionLimit(50))));

        let scope = GenericScope::none();
        let parsed = SignatureParser::new(&data, &scope)
            .with_max_depth(200)
            .parse_type();
        assert!(parsed.is_ok());

        // Siblings do not add up to the depth
        let mut siblings = vec![0x07, 60];
        siblings.extend(std::iter::repeat(0x08).take(60));
        assert!(SignatureParser::new(&siblings, &scope)
            .parse_local_var_signature()
            .is_ok());
    }

    #[test]
    fn token_check() {
        let info = TableInfo::new(&[(TableId::TypeRef, 2)], HeapSizes::empty()).unwrap();
        let scope = GenericScope::none();

        // TypeRef 2 exists, TypeRef 3 and TypeDef 1 do not
        assert!(SignatureParser::new(&[0x12, 0x09], &scope)
            .with_token_check(&info)
            .parse_type()
            .is_ok());
        assert!(matches!(
            SignatureParser::new(&[0x12, 0x0D], &scope)
                .with_token_check(&info)
                .parse_type(),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(SignatureParser::new(&[0x11, 0x04], &scope)
            .with_token_check(&info)
            .parse_type()
            .is_err());
    }
}
