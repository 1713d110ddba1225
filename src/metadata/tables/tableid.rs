use strum::{EnumCount, EnumIter, FromRepr};

/// Identifiers of the metadata tables defined by ECMA-335 Partition II §22.
///
/// The discriminant is the table number used in tokens and in the valid-table bitmask of the
/// `#~` stream. Tables are stored in the stream in ascending order of this number.
///
/// ## Table Categories
///
/// ### Core Type System
/// - **`Module`**, **`TypeRef`**, **`TypeDef`**, **`Field`**, **`MethodDef`**, **`Param`**
///
/// ### Type Relationships
/// - **`InterfaceImpl`**, **`NestedClass`**, **`ClassLayout`**, **`FieldLayout`**
///
/// ### Member References
/// - **`MemberRef`**, **`MethodImpl`**, **`MethodSemantics`**
///
/// ### Metadata and Attributes
/// - **`CustomAttribute`**, **`Constant`**, **`FieldMarshal`**, **`DeclSecurity`**
///
/// ### Signatures and Generics
/// - **`StandAloneSig`**, **`TypeSpec`**, **`MethodSpec`**, **`GenericParam`**,
///   **`GenericParamConstraint`**
///
/// ### Assembly Manifest
/// - **`Assembly`**, **`AssemblyRef`**, **`File`**, **`ExportedType`**, **`ManifestResource`**
///   and the processor/OS tables
///
/// ### Indirection and Edit-and-Continue
/// - **`FieldPtr`**, **`MethodPtr`**, **`ParamPtr`**, **`EventPtr`**, **`PropertyPtr`**,
///   **`EncLog`**, **`EncMap`**
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, EnumIter, EnumCount, FromRepr)]
#[repr(u8)]
pub enum TableId {
    /// `Module` - the current module
    Module = 0x00,
    /// `TypeRef` - references to types of other modules
    TypeRef = 0x01,
    /// `TypeDef` - types defined in this module
    TypeDef = 0x02,
    /// `FieldPtr` - field indirection
    FieldPtr = 0x03,
    /// `Field` - field definitions
    Field = 0x04,
    /// `MethodPtr` - method indirection
    MethodPtr = 0x05,
    /// `MethodDef` - method definitions
    MethodDef = 0x06,
    /// `ParamPtr` - parameter indirection
    ParamPtr = 0x07,
    /// `Param` - parameter definitions
    Param = 0x08,
    /// `InterfaceImpl` - interfaces implemented by types
    InterfaceImpl = 0x09,
    /// `MemberRef` - references to fields and methods
    MemberRef = 0x0A,
    /// `Constant` - constant values of fields, parameters and properties
    Constant = 0x0B,
    /// `CustomAttribute` - custom attribute applications
    CustomAttribute = 0x0C,
    /// `FieldMarshal` - marshalling descriptors
    FieldMarshal = 0x0D,
    /// `DeclSecurity` - declarative security
    DeclSecurity = 0x0E,
    /// `ClassLayout` - explicit type layout
    ClassLayout = 0x0F,
    /// `FieldLayout` - explicit field offsets
    FieldLayout = 0x10,
    /// `StandAloneSig` - standalone signatures
    StandAloneSig = 0x11,
    /// `EventMap` - type to event list mapping
    EventMap = 0x12,
    /// `EventPtr` - event indirection
    EventPtr = 0x13,
    /// `Event` - event definitions
    Event = 0x14,
    /// `PropertyMap` - type to property list mapping
    PropertyMap = 0x15,
    /// `PropertyPtr` - property indirection
    PropertyPtr = 0x16,
    /// `Property` - property definitions
    Property = 0x17,
    /// `MethodSemantics` - accessor methods of events and properties
    MethodSemantics = 0x18,
    /// `MethodImpl` - explicit method overrides
    MethodImpl = 0x19,
    /// `ModuleRef` - references to other modules
    ModuleRef = 0x1A,
    /// `TypeSpec` - type specifications
    TypeSpec = 0x1B,
    /// `ImplMap` - P/Invoke mappings
    ImplMap = 0x1C,
    /// `FieldRVA` - initial data of fields
    FieldRVA = 0x1D,
    /// `EncLog` - edit-and-continue log
    EncLog = 0x1E,
    /// `EncMap` - edit-and-continue mapping
    EncMap = 0x1F,
    /// `Assembly` - the assembly manifest
    Assembly = 0x20,
    /// `AssemblyProcessor` - unused
    AssemblyProcessor = 0x21,
    /// `AssemblyOS` - unused
    AssemblyOS = 0x22,
    /// `AssemblyRef` - referenced assemblies
    AssemblyRef = 0x23,
    /// `AssemblyRefProcessor` - unused
    AssemblyRefProcessor = 0x24,
    /// `AssemblyRefOS` - unused
    AssemblyRefOS = 0x25,
    /// `File` - files of a multi-module assembly
    File = 0x26,
    /// `ExportedType` - types exported from other modules
    ExportedType = 0x27,
    /// `ManifestResource` - manifest resources
    ManifestResource = 0x28,
    /// `NestedClass` - nesting relationships
    NestedClass = 0x29,
    /// `GenericParam` - generic parameters of types and methods
    GenericParam = 0x2A,
    /// `MethodSpec` - generic method instantiations
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` - constraints on generic parameters
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Position of this table in dense per-table arrays
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Bit of this table in the valid and sorted bitmasks
    #[must_use]
    pub fn mask(self) -> u64 {
        1_u64 << (self as u8)
    }

    /// Top byte of the tokens referencing this table
    #[must_use]
    pub fn token_prefix(self) -> u32 {
        u32::from(self as u8) << 24
    }
}

impl TryFrom<u8> for TableId {
    type Error = crate::Error;

    fn try_from(value: u8) -> crate::Result<Self> {
        TableId::from_repr(value).ok_or_else(|| {
            crate::Error::NotSupported(format!("metadata table {value:#04x}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn dense() {
        assert_eq!(TableId::COUNT, 0x2D);
        for (position, table) in TableId::iter().enumerate() {
            assert_eq!(table.index(), position);
            assert_eq!(TableId::try_from(position as u8).unwrap(), table);
        }
        assert!(TableId::try_from(0x2D).is_err());
        assert!(TableId::try_from(0x30).is_err());
    }

    #[test]
    fn masks() {
        assert_eq!(TableId::Module.mask(), 1);
        assert_eq!(TableId::TypeDef.mask(), 4);
        assert_eq!(TableId::GenericParamConstraint.mask(), 1 << 0x2C);
        assert_eq!(TableId::MethodDef.token_prefix(), 0x0600_0000);
    }
}
