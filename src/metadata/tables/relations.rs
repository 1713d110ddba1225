//! Implicit relationships between tables.
//!
//! ECMA-335 encodes one-to-many relationships without back references, in two ways:
//!
//! - **List columns**: a row of the owner table (`TypeDef.FieldList`, `MethodDef.ParamList`,
//!   ...) names the first row of its run in the member table; the run ends where the run of the
//!   next owner row begins, or at the end of the member table. With the `*Ptr` indirection
//!   tables present, the run indexes the pointer table instead.
//! - **Sorted owner columns**: the member table is sorted by a column naming its owner
//!   (`CustomAttribute.Parent`, `GenericParam.Owner`, ...). The members of one owner form a
//!   contiguous run, located with the range search of [`MetadataTable`].
//!
//! Tables are ordered by the raw value of the owner column, which for coded indexes is the
//! encoded value rather than the token.

use crate::{
    metadata::{
        streams::{ColumnValue, TablesHeader},
        tables::{
            ClassLayoutRaw, CodedIndexType, ConstantRaw, CustomAttributeRaw, DeclSecurityRaw,
            EventMapRaw, FieldRvaRaw, GenericParamConstraintRaw, GenericParamRaw,
            InterfaceImplRaw, MethodDefRaw, MethodSemanticsRaw, NestedClassRaw, PropertyMapRaw,
            RowReadable, TableId, TypeDefRaw,
        },
        token::Token,
    },
    Error, Result,
};

fn encoded(kind: CodedIndexType, token: Token) -> u32 {
    // Decoded rows always carry a candidate table, the fallback is unreachable
    kind.encode(token).unwrap_or(u32::MAX)
}

impl TablesHeader<'_> {
    /// Members of the `Field` table owned by `TypeDef` row `typedef`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `typedef` is not a row of `TypeDef`.
    pub fn type_fields(&self, typedef: u32) -> Result<Vec<Token>> {
        self.list_range::<TypeDefRaw>(typedef, |row| row.field_list, TableId::Field, TableId::FieldPtr)
    }

    /// Members of the `MethodDef` table owned by `TypeDef` row `typedef`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `typedef` is not a row of `TypeDef`.
    pub fn type_methods(&self, typedef: u32) -> Result<Vec<Token>> {
        self.list_range::<TypeDefRaw>(
            typedef,
            |row| row.method_list,
            TableId::MethodDef,
            TableId::MethodPtr,
        )
    }

    /// Members of the `Param` table owned by `MethodDef` row `method`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `method` is not a row of `MethodDef`.
    pub fn method_params(&self, method: u32) -> Result<Vec<Token>> {
        self.list_range::<MethodDefRaw>(method, |row| row.param_list, TableId::Param, TableId::ParamPtr)
    }

    /// Members of the `Event` table owned by the `EventMap` row of `TypeDef` row `typedef`.
    ///
    /// # Errors
    /// Returns any error raised while reading `EventMap`.
    pub fn type_events(&self, typedef: u32) -> Result<Vec<Token>> {
        let Some(maps) = self.table::<EventMapRaw>() else {
            return Ok(Vec::new());
        };

        for index in 0..maps.row_count() {
            let map = maps.get(index)?;
            if map.parent == typedef {
                return self.list_range::<EventMapRaw>(
                    map.rid,
                    |row| row.event_list,
                    TableId::Event,
                    TableId::EventPtr,
                );
            }
        }

        Ok(Vec::new())
    }

    /// Members of the `Property` table owned by the `PropertyMap` row of `TypeDef` row
    /// `typedef`.
    ///
    /// # Errors
    /// Returns any error raised while reading `PropertyMap`.
    pub fn type_properties(&self, typedef: u32) -> Result<Vec<Token>> {
        let Some(maps) = self.table::<PropertyMapRaw>() else {
            return Ok(Vec::new());
        };

        for index in 0..maps.row_count() {
            let map = maps.get(index)?;
            if map.parent == typedef {
                return self.list_range::<PropertyMapRaw>(
                    map.rid,
                    |row| row.property_list,
                    TableId::Property,
                    TableId::PropertyPtr,
                );
            }
        }

        Ok(Vec::new())
    }

    /// The `TypeDef` whose field or method list contains `member`, a `Field` or `MethodDef`
    /// token.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] for a token of any other table.
    pub fn declaring_type(&self, member: Token) -> Result<Option<Token>> {
        let (list, pointer): (fn(&TypeDefRaw) -> u32, TableId) = match member.table() {
            Some(TableId::Field) => (|row| row.field_list, TableId::FieldPtr),
            Some(TableId::MethodDef) => (|row| row.method_list, TableId::MethodPtr),
            _ => {
                return Err(Error::Precondition(format!(
                    "{} is neither a field nor a method",
                    member
                )))
            }
        };

        let position = if self.has_table(pointer) {
            let mut found = None;
            for index in 0..self.row_count(pointer) {
                if self.column(pointer, index, 0)? == ColumnValue::Token(member) {
                    found = Some(index + 1);
                    break;
                }
            }
            match found {
                Some(position) => position,
                None => return Ok(None),
            }
        } else {
            member.rid()
        };

        let Some(typedefs) = self.table::<TypeDefRaw>() else {
            return Ok(None);
        };

        let owners = typedefs.count_at_most(&position, list)?;
        Ok((owners > 0).then(|| Token::from_rid(TableId::TypeDef, owners)))
    }

    /// Custom attributes attached to `parent`, in table order.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `CustomAttribute` is not flagged as sorted,
    /// and [`crate::Error::Malformed`] if `parent` cannot carry attributes.
    pub fn custom_attributes(&self, parent: Token) -> Result<Vec<CustomAttributeRaw>> {
        let kind = CodedIndexType::HasCustomAttribute;
        let key = kind.encode(parent)?;
        self.sorted_children(&key, |row: &CustomAttributeRaw| encoded(kind, row.parent))
    }

    /// Generic parameters of `owner`, a `TypeDef` or `MethodDef`, ordered by number.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `GenericParam` is not flagged as sorted.
    pub fn generic_params(&self, owner: Token) -> Result<Vec<GenericParamRaw>> {
        let kind = CodedIndexType::TypeOrMethodDef;
        let key = kind.encode(owner)?;
        let mut params = self.sorted_children(&key, |row: &GenericParamRaw| encoded(kind, row.owner))?;
        params.sort_by_key(|param| param.number);
        Ok(params)
    }

    /// Constraints of `GenericParam` row `param`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `GenericParamConstraint` is not flagged as
    /// sorted.
    pub fn generic_param_constraints(&self, param: u32) -> Result<Vec<GenericParamConstraintRaw>> {
        self.sorted_children(&param, |row: &GenericParamConstraintRaw| row.owner)
    }

    /// Interfaces implemented by `TypeDef` row `typedef`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `InterfaceImpl` is not flagged as sorted.
    pub fn interfaces(&self, typedef: u32) -> Result<Vec<InterfaceImplRaw>> {
        self.sorted_children(&typedef, |row: &InterfaceImplRaw| row.class)
    }

    /// The enclosing `TypeDef` row of the nested `TypeDef` row `typedef`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `NestedClass` is not flagged as sorted.
    pub fn enclosing_type(&self, typedef: u32) -> Result<Option<u32>> {
        Ok(self
            .sorted_single(&typedef, |row: &NestedClassRaw| row.nested_class)?
            .map(|row| row.enclosing_class))
    }

    /// The default value of `parent`, a `Field`, `Param` or `Property`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `Constant` is not flagged as sorted.
    pub fn constant(&self, parent: Token) -> Result<Option<ConstantRaw>> {
        let kind = CodedIndexType::HasConstant;
        let key = kind.encode(parent)?;
        self.sorted_single(&key, |row: &ConstantRaw| encoded(kind, row.parent))
    }

    /// The explicit layout of `TypeDef` row `typedef`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `ClassLayout` is not flagged as sorted.
    pub fn class_layout(&self, typedef: u32) -> Result<Option<ClassLayoutRaw>> {
        self.sorted_single(&typedef, |row: &ClassLayoutRaw| row.parent)
    }

    /// The initial data RVA of `Field` row `field`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `FieldRVA` is not flagged as sorted.
    pub fn field_rva(&self, field: u32) -> Result<Option<FieldRvaRaw>> {
        self.sorted_single(&field, |row: &FieldRvaRaw| row.field)
    }

    /// Accessor methods of `association`, an `Event` or `Property`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `MethodSemantics` is not flagged as sorted.
    pub fn method_semantics(&self, association: Token) -> Result<Vec<MethodSemanticsRaw>> {
        let kind = CodedIndexType::HasSemantics;
        let key = kind.encode(association)?;
        self.sorted_children(&key, |row: &MethodSemanticsRaw| encoded(kind, row.association))
    }

    /// Security declarations attached to `parent`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `DeclSecurity` is not flagged as sorted.
    pub fn decl_security(&self, parent: Token) -> Result<Vec<DeclSecurityRaw>> {
        let kind = CodedIndexType::HasDeclSecurity;
        let key = kind.encode(parent)?;
        self.sorted_children(&key, |row: &DeclSecurityRaw| encoded(kind, row.parent))
    }

    fn list_range<O: RowReadable>(
        &self,
        owner: u32,
        list: impl Fn(&O) -> u32,
        target: TableId,
        pointer: TableId,
    ) -> Result<Vec<Token>> {
        let Some(owners) = self.table::<O>() else {
            return Err(out_of_bounds_error!());
        };

        let indirect = self.has_table(pointer);
        let members = self.row_count(if indirect { pointer } else { target });

        let start = list(&owners.get_rid(owner)?).max(1);
        let end = if owner < owners.row_count() {
            list(&owners.get_rid(owner + 1)?)
        } else {
            members + 1
        }
        .min(members + 1);

        if start >= end {
            return Ok(Vec::new());
        }

        if !indirect {
            return Ok((start..end)
                .map(|rid| Token::from_rid(target, rid))
                .collect());
        }

        (start..end)
            .map(|position| match self.column(pointer, position - 1, 0)? {
                ColumnValue::Token(token) => Ok(token),
                other => Err(malformed_error!(
                    "Pointer table {:?} holds {:?}",
                    pointer,
                    other
                )),
            })
            .collect()
    }

    fn sorted_children<T: RowReadable, K: Ord>(
        &self,
        key: &K,
        project: impl Fn(&T) -> K,
    ) -> Result<Vec<T>> {
        let Some(table) = self.table::<T>() else {
            return Ok(Vec::new());
        };

        table
            .children(key, project)?
            .map(|index| table.get(index))
            .collect()
    }

    fn sorted_single<T: RowReadable, K: Ord>(
        &self,
        key: &K,
        project: impl Fn(&T) -> K,
    ) -> Result<Option<T>> {
        let Some(table) = self.table::<T>() else {
            return Ok(None);
        };

        let range = table.children(key, project)?;
        if range.is_empty() {
            return Ok(None);
        }
        table.get(range.start).map(Some)
    }
}
