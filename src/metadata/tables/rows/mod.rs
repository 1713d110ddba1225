//! Typed raw rows.
//!
//! Each row type mirrors the columns of one table ([`crate::metadata::tables::schema`]) with
//! heap references kept as raw offsets, simple indexes as one-based row numbers and coded
//! indexes decoded into [`crate::metadata::token::Token`]s. Rows are plain values decoded on
//! demand by [`crate::metadata::tables::MetadataTable`].

/// Generates the row type of a `*Ptr` indirection table: a single simple index column.
macro_rules! pointer_row {
    ($name:ident, $table:expr, $target:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            /// One-based row number
            pub rid: u32,
            /// Token of this row
            pub token: Token,
            /// One-based row of the target table
            pub target: u32,
        }

        impl RowReadable for $name {
            const TABLE: TableId = $table;

            fn row_read(
                data: &[u8],
                offset: &mut usize,
                rid: u32,
                info: &TableInfo,
            ) -> Result<Self> {
                Ok($name {
                    rid,
                    token: Token::from_rid(Self::TABLE, rid),
                    target: info.read_index(data, offset, $target)?,
                })
            }
        }
    };
}

mod assembly;
mod attributes;
mod members;
mod semantics;
mod types;

pub use assembly::{AssemblyRaw, AssemblyRefRaw, FileRaw, ModuleRaw, ModuleRefRaw};
pub use attributes::{
    ConstantRaw, CustomAttributeRaw, DeclSecurityRaw, GenericParamConstraintRaw, GenericParamRaw,
};
pub use members::{
    FieldPtrRaw, FieldRaw, FieldRvaRaw, MemberRefRaw, MethodDefRaw, MethodPtrRaw, MethodSpecRaw,
    ParamPtrRaw, ParamRaw, StandAloneSigRaw,
};
pub use semantics::{
    EventMapRaw, EventPtrRaw, EventRaw, MethodSemanticsAttributes, MethodSemanticsRaw,
    PropertyMapRaw, PropertyPtrRaw, PropertyRaw,
};
pub use types::{
    ClassLayoutRaw, InterfaceImplRaw, NestedClassRaw, TypeAttributes, TypeDefRaw, TypeRefRaw,
    TypeSpecRaw,
};

use crate::{
    metadata::tables::{TableId, TableInfo},
    Result,
};

/// A row type that can be decoded from the bytes of its table.
pub trait RowReadable: Sized + Send {
    /// The table this row type belongs to
    const TABLE: TableId;

    /// Decode one row at `offset` and advance `offset` past it.
    ///
    /// ## Arguments
    /// * `data` - Bytes holding the row
    /// * `offset` - Read position, advanced by exactly one row size
    /// * `rid` - One-based row number of the row being read
    /// * `info` - Column widths of the current image
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is too short and
    /// [`crate::Error::Malformed`] for a coded index with an invalid tag.
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, info: &TableInfo) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rayon::iter::ParallelIterator;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::{
        file::Lifeline,
        metadata::tables::{HeapSizes, MetadataTable, TableInfo},
    };

    fn consumed<T: RowReadable>(info: &TableInfo) -> usize {
        let data = vec![0_u8; 64];
        let mut offset = 0;
        // Tags of zero are valid for every coded index kind except CustomAttributeType
        T::row_read(&data, &mut offset, 1, info).map(|_| offset).unwrap_or(usize::MAX)
    }

    fn check_all(info: &TableInfo) {
        macro_rules! check {
            ($($raw:ty),* $(,)?) => {
                $(
                    assert_eq!(
                        consumed::<$raw>(info),
                        info.row_size(<$raw>::TABLE) as usize,
                        "{}",
                        stringify!($raw)
                    );
                )*
            };
        }

        check!(
            ModuleRaw, TypeRefRaw, TypeDefRaw, FieldPtrRaw, FieldRaw, MethodPtrRaw, MethodDefRaw,
            ParamPtrRaw, ParamRaw, InterfaceImplRaw, MemberRefRaw, ConstantRaw, DeclSecurityRaw,
            ClassLayoutRaw, FieldRvaRaw, StandAloneSigRaw, EventMapRaw, EventPtrRaw, EventRaw,
            PropertyMapRaw, PropertyPtrRaw, PropertyRaw, MethodSemanticsRaw, ModuleRefRaw,
            TypeSpecRaw, AssemblyRaw, AssemblyRefRaw, FileRaw, NestedClassRaw, GenericParamRaw,
            MethodSpecRaw, GenericParamConstraintRaw,
        );
    }

    #[test]
    fn readers_match_layout() {
        check_all(&TableInfo::new(&[], HeapSizes::empty()).unwrap());
        check_all(&TableInfo::new(&[], HeapSizes::STRINGS | HeapSizes::GUID | HeapSizes::BLOB).unwrap());

        let large: Vec<(TableId, u32)> = TableId::iter().map(|table| (table, 0x1_0000)).collect();
        check_all(&TableInfo::new(&large, HeapSizes::all()).unwrap());
    }

    #[test]
    fn custom_attribute_layout() {
        // The zero tag is reserved for CustomAttributeType, so read a valid row instead
        let info = TableInfo::new(&[], HeapSizes::empty()).unwrap();
        let data = [0x23, 0x00, 0x0B, 0x00, 0x01, 0x00];
        let mut offset = 0;

        let row = CustomAttributeRaw::row_read(&data, &mut offset, 1, &info).unwrap();
        assert_eq!(offset, info.row_size(TableId::CustomAttribute) as usize);
        assert_eq!(row.parent.value(), 0x0200_0001);
        assert_eq!(row.constructor.value(), 0x0A00_0001);
        assert_eq!(row.value, 1);
    }

    #[test]
    fn typed_table() {
        let info = Arc::new(TableInfo::new(&[(TableId::Param, 3)], HeapSizes::empty()).unwrap());
        #[rustfmt::skip]
        let data = [
            0x01, 0x00, 0x00, 0x00, 0x10, 0x00,
            0x00, 0x00, 0x01, 0x00, 0x20, 0x00,
            0x00, 0x00, 0x02, 0x00, 0x30, 0x00,
        ];
        let table = MetadataTable::<ParamRaw>::new(&data, info, false, Lifeline::detached()).unwrap();

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.row_size(), 6);

        let row = table.get(1).unwrap();
        assert_eq!(row.rid, 2);
        assert_eq!(row.token.value(), 0x0800_0002);
        assert_eq!(row.sequence, 1);
        assert_eq!(row.name, 0x20);
        assert_eq!(table.get_rid(1).unwrap().flags, 1);

        assert!(table.get(3).is_err());
        assert!(table.get_rid(0).is_err());

        let sequences: Vec<u16> = table.iter().map(|row| row.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);

        let mut names: Vec<u32> = table
            .par_iter()
            .map(|row| row.map(|row| row.name))
            .collect::<crate::Result<_>>()
            .unwrap();
        names.sort_unstable();
        assert_eq!(names, vec![0x10, 0x20, 0x30]);

        assert!(matches!(
            table.children(&1, |row| row.sequence),
            Err(crate::Error::Precondition(_))
        ));
        assert_eq!(table.count_at_most(&1, |row| row.sequence).unwrap(), 2);
    }

    #[test]
    fn sorted_table() {
        let info = Arc::new(TableInfo::new(&[(TableId::NestedClass, 6)], HeapSizes::empty()).unwrap());
        let mut data = Vec::new();
        for (nested, enclosing) in [(1_u16, 9_u16), (1, 9), (3, 8), (3, 8), (3, 8), (7, 2)] {
            data.extend_from_slice(&nested.to_le_bytes());
            data.extend_from_slice(&enclosing.to_le_bytes());
        }
        let table =
            MetadataTable::<NestedClassRaw>::new(&data, info, true, Lifeline::detached()).unwrap();

        assert_eq!(table.greatest_lower_bound(&3, |row| row.nested_class).unwrap(), Some(1));
        assert_eq!(table.least_upper_bound(&3, |row| row.nested_class).unwrap(), 5);
        assert_eq!(table.greatest_lower_bound(&0, |row| row.nested_class).unwrap(), None);
        assert_eq!(table.least_upper_bound(&10, |row| row.nested_class).unwrap(), 6);
        assert_eq!(table.children(&3, |row| row.nested_class).unwrap(), 2..5);
    }

    #[test]
    fn short_data() {
        let info = Arc::new(TableInfo::new(&[(TableId::Param, 3)], HeapSizes::empty()).unwrap());
        assert!(MetadataTable::<ParamRaw>::new(&[0_u8; 17], info, false, Lifeline::detached()).is_err());
    }
}
