use crate::{
    metadata::{
        signatures::{GenericParameterKind, GenericParameterRef},
        streams::TablesHeader,
        tables::TableId,
        token::Token,
    },
    Result,
};

/// The generic parameters a signature may reference.
///
/// `VAR n` resolves to the n-th parameter of the enclosing type and `MVAR n` to the n-th
/// parameter of the method. A signature that references a parameter kind the scope does not
/// declare, or a position past its end, fails to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericScope {
    type_params: Option<Vec<Token>>,
    method_params: Option<Vec<Token>>,
    open: bool,
}

impl GenericScope {
    /// A scope without generic parameters, `VAR` and `MVAR` are rejected
    #[must_use]
    pub fn none() -> Self {
        GenericScope::default()
    }

    /// A scope that accepts every `VAR` and `MVAR` without resolving it
    #[must_use]
    pub fn open() -> Self {
        GenericScope {
            open: true,
            ..GenericScope::default()
        }
    }

    /// The scope of `TypeDef` row `typedef`: its own generic parameters.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `GenericParam` is present but not sorted.
    pub fn for_type(tables: &TablesHeader, typedef: u32) -> Result<Self> {
        let owner = Token::from_rid(TableId::TypeDef, typedef);
        Ok(GenericScope::none().with_type_params(owned_params(tables, owner)?))
    }

    /// The scope of `MethodDef` row `method`: its own parameters and those of its declaring type.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `GenericParam` is present but not sorted.
    pub fn for_method(tables: &TablesHeader, method: u32) -> Result<Self> {
        let owner = Token::from_rid(TableId::MethodDef, method);
        let type_params = match tables.declaring_type(owner)? {
            Some(declaring) => owned_params(tables, declaring)?,
            None => Vec::new(),
        };

        Ok(GenericScope::none()
            .with_type_params(type_params)
            .with_method_params(owned_params(tables, owner)?))
    }

    /// Replace the type parameters, ordered by number
    #[must_use]
    pub fn with_type_params(mut self, params: Vec<Token>) -> Self {
        self.type_params = Some(params);
        self
    }

    /// Replace the method parameters, ordered by number
    #[must_use]
    pub fn with_method_params(mut self, params: Vec<Token>) -> Self {
        self.method_params = Some(params);
        self
    }

    /// Returns true if the scope resolves nothing and accepts everything
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Resolve the `number`-th parameter of `kind`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the scope declares no parameters of `kind` or
    /// fewer than `number + 1`.
    pub fn resolve(&self, kind: GenericParameterKind, number: u32) -> Result<GenericParameterRef> {
        if self.open {
            return Ok(GenericParameterRef {
                kind,
                number,
                param: None,
            });
        }

        let params = match kind {
            GenericParameterKind::Type => self.type_params.as_ref(),
            GenericParameterKind::Method => self.method_params.as_ref(),
        };
        let Some(params) = params else {
            return Err(malformed_error!(
                "{:?} generic parameter {} outside of a {:?} scope",
                kind,
                number,
                kind
            ));
        };

        match params.get(number as usize) {
            Some(param) => Ok(GenericParameterRef {
                kind,
                number,
                param: Some(*param),
            }),
            None => Err(malformed_error!(
                "{:?} generic parameter {} out of range, the scope declares {}",
                kind,
                number,
                params.len()
            )),
        }
    }
}

fn owned_params(tables: &TablesHeader, owner: Token) -> Result<Vec<Token>> {
    Ok(tables
        .generic_params(owner)?
        .into_iter()
        .map(|param| param.token)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::tables::CodedIndexType,
        test::{coded, TablesBuilder},
        Error,
    };

    #[test]
    fn resolve() {
        let t = Token::new(0x2A00_0001);
        let u = Token::new(0x2A00_0002);
        let scope = GenericScope::none()
            .with_type_params(vec![t])
            .with_method_params(vec![u]);

        let var = scope.resolve(GenericParameterKind::Type, 0).unwrap();
        assert_eq!(var.param, Some(t));
        let mvar = scope.resolve(GenericParameterKind::Method, 0).unwrap();
        assert_eq!(mvar.param, Some(u));

        assert!(matches!(
            scope.resolve(GenericParameterKind::Type, 1),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn kind_mismatch() {
        let scope = GenericScope::none().with_type_params(vec![Token::new(0x2A00_0001)]);
        assert!(scope.resolve(GenericParameterKind::Method, 0).is_err());
        assert!(GenericScope::none()
            .resolve(GenericParameterKind::Type, 0)
            .is_err());

        let open = GenericScope::open();
        assert_eq!(
            open.resolve(GenericParameterKind::Method, 7).unwrap().param,
            None
        );
    }

    #[test]
    fn from_tables() {
        let owner = CodedIndexType::TypeOrMethodDef;
        let data = TablesBuilder::new()
            .rows(TableId::TypeDef, 2, |index| vec![0, 0, 0, 0, 1, index + 1])
            .rows(TableId::MethodDef, 2, |_| vec![0, 0, 0, 0, 0, 1])
            .sorted(TableId::GenericParam)
            .row(TableId::GenericParam, &[1, 0, coded(owner, 0x0200_0002), 0])
            .row(TableId::GenericParam, &[0, 0, coded(owner, 0x0200_0002), 0])
            .row(TableId::GenericParam, &[0, 0, coded(owner, 0x0600_0002), 0])
            .build();
        let tables = TablesHeader::from(&data).unwrap();

        let scope = GenericScope::for_type(&tables, 2).unwrap();
        let second = scope.resolve(GenericParameterKind::Type, 1).unwrap();
        assert_eq!(second.param, Some(Token::new(0x2A00_0001)));
        assert!(scope.resolve(GenericParameterKind::Method, 0).is_err());

        let scope = GenericScope::for_method(&tables, 2).unwrap();
        assert_eq!(
            scope.resolve(GenericParameterKind::Method, 0).unwrap().param,
            Some(Token::new(0x2A00_0003))
        );
        assert_eq!(
            scope.resolve(GenericParameterKind::Type, 0).unwrap().param,
            Some(Token::new(0x2A00_0002))
        );

        let scope = GenericScope::for_type(&tables, 1).unwrap();
        assert!(scope.resolve(GenericParameterKind::Type, 0).is_err());
    }
}
