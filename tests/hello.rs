//! The synthetic `Hello.dll` module, loaded from disk and walked layer by layer.
//!
//! ```csharp
//! namespace Hello {
//!     public class Program {
//!         int count;
//!         public static void Main(string[] args) { Console.WriteLine("Hello, World!"); }
//!         public Program() { }
//!         class Nested { int value; }
//!     }
//!     public class Box<T> {
//!         T[] items;
//!         public T Get<U>(U key) { ... }
//!     }
//! }
//! ```

mod common;

use clrmap::file::pe::DirectoryExt;

use clrmap::{
    metadata::{
        cor20header::CorFlags,
        root::CIL_HEADER_MAGIC,
        streams::StreamKind,
        tables::{
            AssemblyRaw, CustomAttributeRaw, MemberRefRaw, MethodDefRaw, ModuleRaw, TableId,
            TypeDefRaw, TypeRefRaw,
        },
        token::Token,
    },
    CilView,
};
use common::{write_image, ImageBuilder, CODE_RVA};

#[test]
fn hello() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "Hello.dll", &ImageBuilder::new().build());
    let view = CilView::from_file(&path).unwrap();

    verify_pe(&view);
    verify_cor20(&view);
    verify_root(&view);
    verify_tableheader(&view);
    verify_heaps(&view);
    verify_relations(&view);
}

/// Verify the PE headers written by the image builder
fn verify_pe(view: &CilView) {
    let pe = view.file().pe();

    assert!(!pe.is_pe32_plus());
    assert_eq!(pe.sections.len(), 2);
    assert_eq!(&pe.sections[0].name, b".text\0\0\0");
    assert_eq!(pe.sections[0].virtual_address, 0x2000);
    assert_eq!(&pe.sections[1].name, b".rsrc\0\0\0");
    assert_eq!(pe.clr().virtual_address, 0x2000);
    assert_eq!(pe.clr().size, 72);
}

/// Verify the CLR header
fn verify_cor20(view: &CilView) {
    let cor20 = view.cor20header();

    assert_eq!(cor20.cb, 0x48);
    assert_eq!(cor20.major_runtime_version, 2);
    assert_eq!(cor20.minor_runtime_version, 5);
    assert!(cor20.metadata.virtual_address > CODE_RVA);
    assert!(cor20.flags.contains(CorFlags::ILONLY));
    assert_eq!(cor20.entry_point, 0x0600_0001);
    assert!(cor20.resources.is_empty());
    assert!(cor20.strong_name_signature.is_empty());
    assert_eq!(view.entry_point(), Some(Token::new(0x0600_0001)));
}

/// Verify the metadata root and its stream directory
fn verify_root(view: &CilView) {
    let root = view.root();

    assert_eq!(root.major_version, 1);
    assert_eq!(root.minor_version, 1);
    assert_eq!(root.version, "v4.0.30319");
    assert_eq!(root.flags, 0);

    let names: Vec<&str> = root
        .stream_headers
        .iter()
        .map(|stream| stream.name.as_str())
        .collect();
    assert_eq!(names, ["#~", "#Strings", "#US", "#GUID", "#Blob"]);

    let mut end = 0;
    for stream in &root.stream_headers {
        assert_eq!(stream.offset % 4, 0);
        assert!(stream.offset >= end);
        end = stream.offset + stream.size;
    }
    assert!(end <= view.cor20header().metadata.size);
    assert!(root.stream(StreamKind::Guid).is_some());
    assert_eq!(CIL_HEADER_MAGIC, 0x424A_5342);
}

/// Verify the `#~` header and a few rows of every kind of column
fn verify_tableheader(view: &CilView) {
    let tables = view.tables().unwrap();
    let strings = view.strings().unwrap();

    assert_eq!(tables.major_version, 2);
    assert_eq!(tables.minor_version, 0);
    assert_eq!(tables.table_count(), 13);
    assert!(tables.is_sorted(TableId::NestedClass));
    assert!(tables.is_sorted(TableId::GenericParam));
    assert!(!tables.is_sorted(TableId::TypeDef));

    // Tables are laid out back to back in id order
    let info = tables.info();
    let mut previous: Option<TableId> = None;
    for summary in tables.table_summary() {
        if let Some(previous) = previous {
            assert_eq!(
                info.table_offset(summary.table_id),
                info.table_offset(previous) + info.table_size(previous)
            );
        }
        previous = Some(summary.table_id);
    }

    let module = tables.table::<ModuleRaw>().unwrap().get_rid(1).unwrap();
    assert_eq!(strings.get(module.name).unwrap(), "Hello.dll");
    assert_eq!(module.mvid, 1);

    let typerefs = tables.table::<TypeRefRaw>().unwrap();
    assert_eq!(typerefs.row_count(), 3);
    let console = typerefs.get_rid(2).unwrap();
    assert_eq!(console.resolution_scope, Token::new(0x2300_0001));
    assert_eq!(strings.get(console.type_name).unwrap(), "Console");
    assert_eq!(strings.get(console.type_namespace).unwrap(), "System");

    let typedefs = tables.table::<TypeDefRaw>().unwrap();
    let names: Vec<&str> = typedefs
        .iter()
        .map(|row| strings.get(row.type_name).unwrap())
        .collect();
    assert_eq!(names, ["<Module>", "Program", "Box`1", "Nested"]);
    assert_eq!(typedefs.get_rid(2).unwrap().extends, Token::new(0x0100_0001));
    assert!(typedefs.get_rid(5).is_err());

    let main = tables.table::<MethodDefRaw>().unwrap().get_rid(1).unwrap();
    assert_eq!(main.rva, CODE_RVA);
    assert_eq!(strings.get(main.name).unwrap(), "Main");

    let write_line = tables.table::<MemberRefRaw>().unwrap().get_rid(1).unwrap();
    assert_eq!(write_line.class, Token::new(0x0100_0002));
    assert_eq!(strings.get(write_line.name).unwrap(), "WriteLine");

    let attribute = tables
        .table::<CustomAttributeRaw>()
        .unwrap()
        .get_rid(1)
        .unwrap();
    assert_eq!(attribute.parent, Token::new(0x0200_0002));
    assert_eq!(attribute.constructor, Token::new(0x0A00_0002));

    let assembly = tables.table::<AssemblyRaw>().unwrap().get_rid(1).unwrap();
    assert_eq!(strings.get(assembly.name).unwrap(), "Hello");
    assert_eq!(assembly.hash_alg_id, 0x8004);
}

/// Verify the heaps
fn verify_heaps(view: &CilView) {
    let guid = view.guids().unwrap().get(1).unwrap().unwrap();
    assert_eq!(
        guid,
        uguid::guid!("d437908e-65e6-487c-9735-7bdff699bea5")
    );
    assert_eq!(view.guids().unwrap().get(0).unwrap(), None);

    let hello = view.userstrings().unwrap().get(1).unwrap();
    assert_eq!(hello.to_string_lossy(), "Hello, World!");

    let blobs = view.blobs().unwrap();
    assert_eq!(blobs.get(0).unwrap(), &[] as &[u8]);
    assert!(blobs.iter().count() > 5);

    assert_eq!(view.strings().unwrap().get(0).unwrap(), "");
}

/// Verify list ranges and owner queries
fn verify_relations(view: &CilView) {
    let tables = view.tables().unwrap();

    assert_eq!(
        tables.type_fields(2).unwrap(),
        [Token::new(0x0400_0001)]
    );
    assert_eq!(
        tables.type_methods(2).unwrap(),
        [Token::new(0x0600_0001), Token::new(0x0600_0002)]
    );
    assert!(tables.type_methods(4).unwrap().is_empty());
    assert_eq!(tables.type_fields(4).unwrap(), [Token::new(0x0400_0003)]);
    assert_eq!(tables.method_params(1).unwrap(), [Token::new(0x0800_0001)]);
    assert!(tables.method_params(2).unwrap().is_empty());

    assert_eq!(
        tables.declaring_type(Token::new(0x0600_0003)).unwrap(),
        Some(Token::new(0x0200_0003))
    );
    assert_eq!(tables.enclosing_type(4).unwrap(), Some(2));
    assert_eq!(tables.enclosing_type(2).unwrap(), None);

    let attributes = tables.custom_attributes(Token::new(0x0200_0002)).unwrap();
    assert_eq!(attributes.len(), 1);
    assert!(tables
        .custom_attributes(Token::new(0x0200_0003))
        .unwrap()
        .is_empty());

    let params = tables.generic_params(Token::new(0x0200_0003)).unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].token, Token::new(0x2A00_0001));

    assert_eq!(
        view.root_types().unwrap(),
        [
            Token::new(0x0200_0001),
            Token::new(0x0200_0002),
            Token::new(0x0200_0003)
        ]
    );
}
