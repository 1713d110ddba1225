//! A loaded module: the verified image together with its parsed metadata.
//!
//! [`CilView`] owns the [`File`] and borrows every structure it parses from it, so heaps and
//! tables are handed out without copying. Decoded `TypeSpec` blobs are memoized per token.
//!
//! # Examples
//!
//! ```rust,no_run
//! use clrmap::CilView;
//! use std::path::Path;
//!
//! let view = CilView::from_file(Path::new("tests/samples/hello.dll"))?;
//! println!("Runtime {}", view.root().version);
//!
//! if let Some(tables) = view.tables() {
//!     for summary in tables.table_summary() {
//!         println!("{:?}: {} rows", summary.table_id, summary.row_count);
//!     }
//! }
//! # Ok::<(), clrmap::Error>(())
//! ```

use std::{collections::HashSet, path::Path, sync::Arc};

use crossbeam_skiplist::SkipMap;
use ouroboros::self_referencing;

use crate::{
    config::{LoadOptions, ValidationConfig},
    file::File,
    metadata::{
        cor20header::Cor20Header,
        method::MethodBody,
        root::Root,
        signatures::{
            FieldSignature, GenericScope, LocalVariables, MethodSignature, MethodSpecSignature,
            SignatureParser, TypeExpression,
        },
        streams::{Blob, Guid, StreamKind, Strings, TablesHeader, UserStrings},
        tables::{
            FieldRaw, MethodDefRaw, MethodSpecRaw, NestedClassRaw, RowReadable, StandAloneSigRaw,
            TableId, TypeSpecRaw,
        },
        token::Token,
    },
    utils::SetOnce,
    Error, Result,
};

/// The parsed structures of a module, borrowing from its image.
pub struct CilViewData<'a> {
    /// The verified CLR header
    pub cor20header: Cor20Header,
    /// The verified metadata root
    pub root: Root,
    /// `#~`
    pub tables: Option<TablesHeader<'a>>,
    /// `#Strings`
    pub strings: Option<Strings<'a>>,
    /// `#US`
    pub userstrings: Option<UserStrings<'a>>,
    /// `#GUID`
    pub guids: Option<Guid<'a>>,
    /// `#Blob`
    pub blobs: Option<Blob<'a>>,
    config: ValidationConfig,
    type_specs: SkipMap<Token, Arc<TypeExpression>>,
    root_types: SetOnce<Vec<Token>>,
}

impl<'a> CilViewData<'a> {
    /// Parse the CLR header, the metadata root and the streams of `file`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the CLR header or the metadata root fails
    /// verification, or a stream cannot be parsed.
    pub fn load(file: &'a File, options: &LoadOptions) -> Result<Self> {
        let config = options.config;
        let lifeline = file.lifeline();

        let clr = file.clr();
        let Some(clr_offset) = file.rva_to_offset(clr.virtual_address, clr.size) else {
            return Err(malformed_error!(
                "CLR header does not resolve - {:#x}/{:#x}",
                clr.virtual_address,
                clr.size
            ));
        };
        let cor20header =
            Cor20Header::read(file.data_slice(clr_offset, clr.size as usize)?, &config)?;
        cor20header.verify(file.pe())?;

        let metadata = file.rva_slice(
            cor20header.metadata.virtual_address,
            cor20header.metadata.size,
        )?;
        let root = Root::read(metadata, &config)?;

        let stream = |kind: StreamKind| -> Option<&'a [u8]> {
            root.stream(kind)
                .and_then(|header| root.stream_data(metadata, header))
        };

        let tables = stream(StreamKind::Tables)
            .map(|data| TablesHeader::with_lifeline(data, lifeline))
            .transpose()?;
        let strings = stream(StreamKind::Strings)
            .map(|data| Strings::with_scanner(data, options.scanner, lifeline))
            .transpose()?;
        let userstrings = stream(StreamKind::UserStrings)
            .map(|data| UserStrings::with_lifeline(data, lifeline))
            .transpose()?;
        let guids = stream(StreamKind::Guid).map(|data| Guid::with_lifeline(data, lifeline));
        let blobs = stream(StreamKind::Blob)
            .map(|data| Blob::with_lifeline(data, lifeline))
            .transpose()?;

        log::debug!(
            "Loaded metadata {} with {} tables",
            root.version,
            tables.as_ref().map_or(0, TablesHeader::table_count)
        );

        Ok(CilViewData {
            cor20header,
            root,
            tables,
            strings,
            userstrings,
            guids,
            blobs,
            config,
            type_specs: SkipMap::new(),
            root_types: SetOnce::new("root types"),
        })
    }

    fn tables(&self) -> Result<&TablesHeader<'a>> {
        self.tables
            .as_ref()
            .ok_or_else(|| malformed_error!("Module has no #~ stream"))
    }

    fn blob(&self, offset: u32) -> Result<&'a [u8]> {
        match &self.blobs {
            Some(blobs) => blobs.get(offset),
            None => Err(malformed_error!("Module has no #Blob stream")),
        }
    }

    fn parser<'s>(
        &'s self,
        data: &'a [u8],
        scope: &'s GenericScope,
    ) -> Result<SignatureParser<'a, 's>> {
        let parser =
            SignatureParser::new(data, scope).with_max_depth(self.config.max_signature_depth);
        if self.config.validate_signature_tokens {
            Ok(parser.with_token_check(self.tables()?.info()))
        } else {
            Ok(parser)
        }
    }
}

#[self_referencing]
/// A verified module and its metadata.
///
/// `CilView` is `Send` and `Sync`; every accessor takes `&self`. After [`CilView::dispose`]
/// the structures remain reachable but every read of image bytes fails with
/// [`crate::Error::Disposed`].
pub struct CilView {
    file: Arc<File>,

    #[borrows(file)]
    #[not_covariant]
    data: CilViewData<'this>,
}

impl CilView {
    /// Load the module at `path` with default options.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be mapped and
    /// [`crate::Error::NotManagedExecutable`] if it is not a valid managed image.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with(path, &LoadOptions::default())
    }

    /// Load the module at `path`.
    ///
    /// # Errors
    /// Same as [`CilView::from_file`].
    pub fn from_file_with(path: &Path, options: &LoadOptions) -> Result<Self> {
        let file = Arc::new(File::from_file(path)?);
        Self::load(file, options).map_err(|error| {
            if error.is_structural() {
                Error::NotManagedExecutable {
                    path: path.to_path_buf(),
                    source: Box::new(error),
                }
            } else {
                error
            }
        })
    }

    /// Load a module held in memory with default options.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty buffer and [`crate::Error::Malformed`] if
    /// it is not a valid managed image.
    pub fn from_mem(data: Vec<u8>) -> Result<Self> {
        Self::from_mem_with(data, &LoadOptions::default())
    }

    /// Load a module held in memory.
    ///
    /// # Errors
    /// Same as [`CilView::from_mem`].
    pub fn from_mem_with(data: Vec<u8>, options: &LoadOptions) -> Result<Self> {
        Self::load(Arc::new(File::from_mem(data)?), options)
    }

    fn load(file: Arc<File>, options: &LoadOptions) -> Result<Self> {
        CilView::try_new(file, |file| CilViewData::load(file, options))
    }

    /// The image
    #[must_use]
    pub fn file(&self) -> &Arc<File> {
        self.borrow_file()
    }

    /// The CLR header
    #[must_use]
    pub fn cor20header(&self) -> &Cor20Header {
        self.with_data(|data| &data.cor20header)
    }

    /// The metadata root
    #[must_use]
    pub fn root(&self) -> &Root {
        self.with_data(|data| &data.root)
    }

    /// The `#~` stream
    #[must_use]
    pub fn tables(&self) -> Option<&TablesHeader> {
        self.with_data(|data| data.tables.as_ref())
    }

    /// The `#Strings` heap
    #[must_use]
    pub fn strings(&self) -> Option<&Strings> {
        self.with_data(|data| data.strings.as_ref())
    }

    /// The `#US` heap
    #[must_use]
    pub fn userstrings(&self) -> Option<&UserStrings> {
        self.with_data(|data| data.userstrings.as_ref())
    }

    /// The `#GUID` heap
    #[must_use]
    pub fn guids(&self) -> Option<&Guid> {
        self.with_data(|data| data.guids.as_ref())
    }

    /// The `#Blob` heap
    #[must_use]
    pub fn blobs(&self) -> Option<&Blob> {
        self.with_data(|data| data.blobs.as_ref())
    }

    /// The validation policy this module was loaded with
    #[must_use]
    pub fn config(&self) -> &ValidationConfig {
        self.with_data(|data| &data.config)
    }

    /// The managed entry point
    #[must_use]
    pub fn entry_point(&self) -> Option<Token> {
        self.cor20header().entry_point_token()
    }

    /// The decoded blob of `TypeSpec` token `token`, decoded once and shared afterwards.
    ///
    /// Generic parameters stay unresolved, a `TypeSpec` has no scope of its own.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] for a token of another table, and any error of
    /// the row read or the decoder.
    pub fn type_spec(&self, token: Token) -> Result<Arc<TypeExpression>> {
        if !token.is_table(TableId::TypeSpec) {
            return Err(Error::Precondition(format!("{} is not a TypeSpec", token)));
        }

        self.with_data(|data| {
            if let Some(entry) = data.type_specs.get(&token) {
                return Ok(Arc::clone(entry.value()));
            }

            let row = typed_row::<TypeSpecRaw>(data, token.rid())?;
            let scope = GenericScope::open();
            let expression = data
                .parser(data.blob(row.signature)?, &scope)?
                .parse_type_spec_signature()?;

            let entry = data.type_specs.get_or_insert(token, Arc::new(expression));
            Ok(Arc::clone(entry.value()))
        })
    }

    /// Number of `TypeSpec` blobs decoded so far
    #[must_use]
    pub fn cached_type_specs(&self) -> usize {
        self.with_data(|data| data.type_specs.len())
    }

    /// The signature of `MethodDef` row `method`, generic parameters resolved against the
    /// method and its declaring type.
    ///
    /// # Errors
    /// Returns an error if the row cannot be read or the signature cannot be decoded.
    pub fn method_signature(&self, method: u32) -> Result<MethodSignature> {
        self.with_data(|data| {
            let row = typed_row::<MethodDefRaw>(data, method)?;
            let scope = GenericScope::for_method(data.tables()?, method)?;
            data.parser(data.blob(row.signature)?, &scope)?
                .parse_method_signature()
        })
    }

    /// The signature of `Field` row `field`, generic parameters resolved against its declaring
    /// type.
    ///
    /// # Errors
    /// Returns an error if the row cannot be read or the signature cannot be decoded.
    pub fn field_signature(&self, field: u32) -> Result<FieldSignature> {
        self.with_data(|data| {
            let row = typed_row::<FieldRaw>(data, field)?;
            let tables = data.tables()?;
            let scope = match tables.declaring_type(Token::from_rid(TableId::Field, field))? {
                Some(owner) => GenericScope::for_type(tables, owner.rid())?,
                None => GenericScope::none(),
            };
            data.parser(data.blob(row.signature)?, &scope)?
                .parse_field_signature()
        })
    }

    /// The instantiation of `MethodSpec` row `spec`, generic parameters left unresolved.
    ///
    /// # Errors
    /// Returns an error if the row cannot be read or the blob cannot be decoded.
    pub fn method_spec(&self, spec: u32) -> Result<MethodSpecSignature> {
        self.with_data(|data| {
            let row = typed_row::<MethodSpecRaw>(data, spec)?;
            let scope = GenericScope::open();
            data.parser(data.blob(row.instantiation)?, &scope)?
                .parse_method_spec_signature()
        })
    }

    /// The body of `MethodDef` row `method`, `None` for a method without IL.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the RVA does not resolve or the body exceeds its
    /// section, and any error of [`MethodBody::read`].
    pub fn method_body(&self, method: u32) -> Result<Option<MethodBody<'_>>> {
        let rva = self.with_data(|data| typed_row::<MethodDefRaw>(data, method).map(|row| row.rva))?;
        if rva == 0 {
            return Ok(None);
        }

        let file = self.borrow_file();
        let Some((offset, available)) = file.pe().resolve_extent(rva) else {
            return Err(out_of_bounds_error!());
        };

        MethodBody::read(file.data_slice(offset, available)?).map(Some)
    }

    /// The local variables of `MethodDef` row `method`, `None` without locals.
    ///
    /// # Errors
    /// Returns an error if the body, the `StandAloneSig` row or the signature cannot be read.
    pub fn local_variables(&self, method: u32) -> Result<Option<LocalVariables>> {
        let Some(body) = self.method_body(method)? else {
            return Ok(None);
        };
        let Some(token) = body.header.local_var_sig() else {
            return Ok(None);
        };

        self.with_data(|data| {
            let row = typed_row::<StandAloneSigRaw>(data, token.rid())?;
            let scope = GenericScope::for_method(data.tables()?, method)?;
            data.parser(data.blob(row.signature)?, &scope)?
                .parse_local_var_signature()
                .map(Some)
        })
    }

    /// `TypeDef` tokens of all types that are not nested in another type, in table order.
    ///
    /// Computed on first use and published once.
    ///
    /// # Errors
    /// Returns an error if the `TypeDef` or `NestedClass` table cannot be read.
    pub fn root_types(&self) -> Result<&[Token]> {
        self.with_data(|data| {
            data.root_types
                .get_or_publish(|| {
                    let tables = data.tables()?;

                    let mut nested = HashSet::new();
                    if let Some(table) = tables.table::<NestedClassRaw>() {
                        for index in 0..table.row_count() {
                            nested.insert(table.get(index)?.nested_class);
                        }
                    }

                    Ok((1..=tables.row_count(TableId::TypeDef))
                        .filter(|rid| !nested.contains(rid))
                        .map(|rid| Token::from_rid(TableId::TypeDef, rid))
                        .collect())
                })
                .map(Vec::as_slice)
        })
    }

    /// Poison the image, see [`File::dispose`]
    pub fn dispose(&self) -> bool {
        self.borrow_file().dispose()
    }

    /// Returns true once the image is disposed
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.borrow_file().is_disposed()
    }
}

impl std::fmt::Debug for CilView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CilView")
            .field("file", self.borrow_file())
            .field("version", &self.root().version)
            .finish_non_exhaustive()
    }
}

fn typed_row<T: RowReadable>(data: &CilViewData, rid: u32) -> Result<T> {
    match data.tables()?.table::<T>() {
        Some(table) => table.get_rid(rid),
        None => Err(out_of_bounds_error!()),
    }
}
