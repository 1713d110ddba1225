//! Coded indexes (ECMA-335 II.24.2.6).
//!
//! A coded index packs a reference into one of several tables into a single column. The low
//! `tag_bits` bits select the table from an ordered candidate list that is fixed per kind; the
//! remaining bits hold the one-based row. The candidate order is part of the file format.
//!
//! Whether a coded index column occupies 2 or 4 bytes depends on the row counts of its
//! candidate tables, see [`crate::metadata::tables::TableInfo::coded_index_bytes`].

use strum::{EnumCount, EnumIter};

use crate::{
    metadata::{
        tables::{TableId, MAX_ROWS},
        token::Token,
    },
    Error, Result,
};

use TableId as T;

/// The thirteen coded index kinds of ECMA-335.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
pub enum CodedIndexType {
    /// `TypeDef`, `TypeRef`, `TypeSpec`
    TypeDefOrRef,
    /// `Field`, `Param`, `Property`
    HasConstant,
    /// Any table that can carry a custom attribute
    HasCustomAttribute,
    /// `Field`, `Param`
    HasFieldMarshal,
    /// `TypeDef`, `MethodDef`, `Assembly`
    HasDeclSecurity,
    /// `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef`, `TypeSpec`
    MemberRefParent,
    /// `Event`, `Property`
    HasSemantics,
    /// `MethodDef`, `MemberRef`
    MethodDefOrRef,
    /// `Field`, `MethodDef`
    MemberForwarded,
    /// `File`, `AssemblyRef`, `ExportedType`
    Implementation,
    /// `MethodDef`, `MemberRef`, in tags 2 and 3 of five
    CustomAttributeType,
    /// `Module`, `ModuleRef`, `AssemblyRef`, `TypeRef`
    ResolutionScope,
    /// `TypeDef`, `MethodDef`
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// The candidate tables in tag order. `None` marks tags that are reserved.
    #[must_use]
    pub fn tables(self) -> &'static [Option<TableId>] {
        match self {
            CodedIndexType::TypeDefOrRef => &[Some(T::TypeDef), Some(T::TypeRef), Some(T::TypeSpec)],
            CodedIndexType::HasConstant => &[Some(T::Field), Some(T::Param), Some(T::Property)],
            CodedIndexType::HasCustomAttribute => &[
                Some(T::MethodDef),
                Some(T::Field),
                Some(T::TypeRef),
                Some(T::TypeDef),
                Some(T::Param),
                Some(T::InterfaceImpl),
                Some(T::MemberRef),
                Some(T::Module),
                Some(T::DeclSecurity),
                Some(T::Property),
                Some(T::Event),
                Some(T::StandAloneSig),
                Some(T::ModuleRef),
                Some(T::TypeSpec),
                Some(T::Assembly),
                Some(T::AssemblyRef),
                Some(T::File),
                Some(T::ExportedType),
                Some(T::ManifestResource),
                Some(T::GenericParam),
                Some(T::GenericParamConstraint),
                Some(T::MethodSpec),
            ],
            CodedIndexType::HasFieldMarshal => &[Some(T::Field), Some(T::Param)],
            CodedIndexType::HasDeclSecurity => {
                &[Some(T::TypeDef), Some(T::MethodDef), Some(T::Assembly)]
            }
            CodedIndexType::MemberRefParent => &[
                Some(T::TypeDef),
                Some(T::TypeRef),
                Some(T::ModuleRef),
                Some(T::MethodDef),
                Some(T::TypeSpec),
            ],
            CodedIndexType::HasSemantics => &[Some(T::Event), Some(T::Property)],
            CodedIndexType::MethodDefOrRef => &[Some(T::MethodDef), Some(T::MemberRef)],
            CodedIndexType::MemberForwarded => &[Some(T::Field), Some(T::MethodDef)],
            CodedIndexType::Implementation => {
                &[Some(T::File), Some(T::AssemblyRef), Some(T::ExportedType)]
            }
            CodedIndexType::CustomAttributeType => {
                &[None, None, Some(T::MethodDef), Some(T::MemberRef), None]
            }
            CodedIndexType::ResolutionScope => &[
                Some(T::Module),
                Some(T::ModuleRef),
                Some(T::AssemblyRef),
                Some(T::TypeRef),
            ],
            CodedIndexType::TypeOrMethodDef => &[Some(T::TypeDef), Some(T::MethodDef)],
        }
    }

    /// Number of low bits used for the tag: `ceil(log2(candidates))`
    #[must_use]
    pub fn tag_bits(self) -> u32 {
        let candidates = self.tables().len() as u32;
        candidates.next_power_of_two().trailing_zeros()
    }

    /// Decode a raw column value into a token.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the tag selects a reserved or missing candidate,
    /// or the row does not fit into a token.
    pub fn decode(self, value: u32) -> Result<Token> {
        let bits = self.tag_bits();
        let tag = (value & ((1 << bits) - 1)) as usize;

        match self.tables().get(tag) {
            Some(Some(table)) if value >> bits > MAX_ROWS => Err(malformed_error!(
                "Row {:#x} of {:?} in coded index {:?} exceeds the token range",
                value >> bits,
                table,
                self
            )),
            Some(Some(table)) => Ok(Token::from_rid(*table, value >> bits)),
            _ => Err(malformed_error!(
                "Invalid tag {} for coded index {:?} - {:#x}",
                tag,
                self,
                value
            )),
        }
    }

    /// Encode `token` as a raw column value.
    ///
    /// The null token encodes as zero. Sorted tables keyed by a coded index are ordered by
    /// this encoded value.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the token's table is not a candidate of this
    /// kind, or its row does not fit next to the tag.
    pub fn encode(self, token: Token) -> Result<u32> {
        let Some(table) = token.table() else {
            return Ok(0);
        };
        let rid = token.rid();

        let Some(tag) = self
            .tables()
            .iter()
            .position(|candidate| *candidate == Some(table))
        else {
            return Err(Error::Precondition(format!(
                "{token} cannot be encoded as {self:?}"
            )));
        };

        let bits = self.tag_bits();
        if rid > (u32::MAX >> bits) {
            return Err(Error::Precondition(format!(
                "{token} is too large for {self:?}"
            )));
        }

        Ok((rid << bits) | tag as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_bits() {
        let expected = [
            (CodedIndexType::TypeDefOrRef, 2),
            (CodedIndexType::HasConstant, 2),
            (CodedIndexType::HasCustomAttribute, 5),
            (CodedIndexType::HasFieldMarshal, 1),
            (CodedIndexType::HasDeclSecurity, 2),
            (CodedIndexType::MemberRefParent, 3),
            (CodedIndexType::HasSemantics, 1),
            (CodedIndexType::MethodDefOrRef, 1),
            (CodedIndexType::MemberForwarded, 1),
            (CodedIndexType::Implementation, 2),
            (CodedIndexType::CustomAttributeType, 3),
            (CodedIndexType::ResolutionScope, 2),
            (CodedIndexType::TypeOrMethodDef, 1),
        ];

        assert_eq!(CodedIndexType::COUNT, expected.len());
        for (kind, bits) in expected {
            assert_eq!(kind.tag_bits(), bits, "{kind:?}");
        }
    }

    #[test]
    fn decode() {
        // TypeDefOrRef: tag 1 = TypeRef, row 3
        let token = CodedIndexType::TypeDefOrRef.decode((3 << 2) | 1).unwrap();
        assert_eq!(token.value(), 0x0100_0003);

        // HasCustomAttribute: tag 14 = Assembly, row 1
        let token = CodedIndexType::HasCustomAttribute
            .decode((1 << 5) | 14)
            .unwrap();
        assert_eq!(token.value(), 0x2000_0001);

        // CustomAttributeType: tag 3 = MemberRef, row 0x10
        let token = CodedIndexType::CustomAttributeType
            .decode((0x10 << 3) | 3)
            .unwrap();
        assert_eq!(token.value(), 0x0A00_0010);

        // Null references
        assert!(CodedIndexType::ResolutionScope.decode(2).unwrap().is_null());
        assert!(CodedIndexType::TypeOrMethodDef.decode(0).unwrap().is_null());
    }

    #[test]
    fn decode_reserved_tag() {
        assert!(CodedIndexType::TypeDefOrRef.decode(3).is_err());
        assert!(CodedIndexType::CustomAttributeType.decode(0x11).is_err());
        assert!(CodedIndexType::CustomAttributeType.decode(0x0C).is_err());
        assert!(CodedIndexType::HasCustomAttribute.decode(22).is_err());
    }

    #[test]
    fn encode() {
        let token = Token::new(0x0600_0007);
        assert_eq!(
            CodedIndexType::HasCustomAttribute.encode(token).unwrap(),
            7 << 5
        );
        assert_eq!(
            CodedIndexType::TypeOrMethodDef.encode(token).unwrap(),
            (7 << 1) | 1
        );
        assert!(CodedIndexType::TypeDefOrRef.encode(token).is_err());
        assert_eq!(
            CodedIndexType::TypeDefOrRef.encode(Token::NULL).unwrap(),
            0
        );

        let encoded = CodedIndexType::MemberRefParent
            .encode(Token::new(0x1B00_0002))
            .unwrap();
        assert_eq!(encoded, (2 << 3) | 4);
        assert_eq!(
            CodedIndexType::MemberRefParent.decode(encoded).unwrap(),
            Token::new(0x1B00_0002)
        );
    }
}
