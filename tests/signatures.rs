//! Signatures, method bodies and locals of a module with a fat method body.

mod common;

use clrmap::{
    metadata::{
        method::{ExceptionClauseKind, MethodHeader},
        signatures::{
            parse_method_signature, CallingConvention, GenericScope, PrimitiveType, TypeExpression,
        },
        tables::{CodedIndexType, MemberRefRaw, TableId},
        token::Token,
    },
    CilView, Error, LoadOptions, ValidationConfig,
};
use common::{coded, ImageBuilder, MetadataBuilder};

/// `Worker` with a field nested 60 arrays deep, `Run` with locals and a try/finally, and a
/// `Broken` method whose return type names a method generic parameter it does not have.
fn worker() -> Vec<u8> {
    let mut metadata = MetadataBuilder::new();
    let module = metadata.string("Worker.dll");
    let worker = metadata.string("Worker");
    let deep = metadata.string("deep");
    let run = metadata.string("Run");
    let broken = metadata.string("Broken");
    let printf = metadata.string("printf");

    let mut deep_sig = vec![0x06];
    deep_sig.extend_from_slice(&[0x1D; 60]);
    deep_sig.push(0x08);
    let deep_sig = metadata.blob(&deep_sig);
    let run_sig = metadata.blob(&[0x00, 0x00, 0x01]);
    let broken_sig = metadata.blob(&[0x00, 0x00, 0x1E, 0x00]);
    let locals = metadata.blob(&[0x07, 0x02, 0x08, 0x1D, 0x0E]);
    let instantiation = metadata.blob(&[0x0A, 0x02, 0x0E, 0x1C]);
    let printf_sig = metadata.blob(&[0x05, 0x02, 0x01, 0x0E, 0x41, 0x08]);

    let metadata = metadata.with_tables(|tables| {
        tables
            .row(TableId::Module, &[0, module, 0, 0, 0])
            .row(TableId::TypeDef, &[0x0010_0001, worker, 0, 0, 1, 1])
            .row(TableId::Field, &[0x0001, deep, deep_sig])
            .row(TableId::MethodDef, &[common::CODE_RVA, 0, 0x0086, run, run_sig, 1])
            .row(TableId::MethodDef, &[0, 0, 0x0086, broken, broken_sig, 1])
            .row(TableId::MemberRef, &[
                coded(CodedIndexType::MemberRefParent, 0x0200_0001),
                printf,
                printf_sig,
            ])
            .row(TableId::StandAloneSig, &[locals])
            .row(TableId::MethodSpec, &[
                coded(CodedIndexType::MethodDefOrRef, 0x0600_0001),
                instantiation,
            ])
    });

    // .maxstack 2, .locals init (int32, string[])
    // try { nop nop } finally { nop endfinally } ret
    let mut code = vec![0x1B, 0x30, 0x02, 0x00];
    code.extend_from_slice(&5_u32.to_le_bytes());
    code.extend_from_slice(&0x1100_0001_u32.to_le_bytes());
    code.extend_from_slice(&[0x00, 0x00, 0x00, 0xDC, 0x2A, 0x00, 0x00, 0x00]);
    code.extend_from_slice(&[0x01, 16, 0x00, 0x00]);
    code.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x02]);
    code.extend_from_slice(&0_u32.to_le_bytes());

    ImageBuilder::new()
        .metadata(metadata.build())
        .code(code)
        .build()
}

#[test]
fn method_body() {
    let view = CilView::from_mem(worker()).unwrap();

    let body = view.method_body(1).unwrap().unwrap();
    assert!(matches!(body.header, MethodHeader::Fat { .. }));
    assert_eq!(body.header.max_stack(), 2);
    assert!(body.header.init_locals());
    assert_eq!(body.header.local_var_sig(), Some(Token::new(0x1100_0001)));
    assert_eq!(body.code, &[0x00, 0x00, 0x00, 0xDC, 0x2A]);

    assert_eq!(body.clauses.len(), 1);
    let finally = body.clauses[0];
    assert_eq!(finally.kind, ExceptionClauseKind::Finally);
    assert!(finally.protects(1));
    assert!(!finally.protects(2));
    assert_eq!(finally.handler_offset, 2);

    assert!(view.method_body(2).unwrap().is_none());
    assert!(matches!(
        view.method_body(3),
        Err(Error::OutOfBounds { .. })
    ));
}

#[test]
fn locals() {
    let view = CilView::from_mem(worker()).unwrap();

    let locals = view.local_variables(1).unwrap().unwrap();
    assert_eq!(locals.locals.len(), 2);
    assert_eq!(locals.locals[0], TypeExpression::Primitive(PrimitiveType::I4));
    assert_eq!(
        locals.locals[1],
        TypeExpression::Vector(Box::new(TypeExpression::Primitive(PrimitiveType::String)))
    );
    assert!(view.local_variables(2).unwrap().is_none());
}

#[test]
fn method_specs() {
    let view = CilView::from_mem(worker()).unwrap();

    let spec = view.method_spec(1).unwrap();
    assert_eq!(
        spec.arguments,
        [
            TypeExpression::Primitive(PrimitiveType::String),
            TypeExpression::Primitive(PrimitiveType::Object)
        ]
    );
}

#[test]
fn varargs() {
    let view = CilView::from_mem(worker()).unwrap();
    let row = view
        .tables()
        .unwrap()
        .table::<MemberRefRaw>()
        .unwrap()
        .get_rid(1)
        .unwrap();

    // vararg void printf(string, ..., int32)
    let blob = view.blobs().unwrap().get(row.signature).unwrap();
    let printf = parse_method_signature(blob, &GenericScope::none()).unwrap();
    assert_eq!(printf.calling_convention, CallingConvention::VarArg);
    assert_eq!(
        printf.params,
        [TypeExpression::Primitive(PrimitiveType::String)]
    );
    assert_eq!(
        printf.varargs,
        [TypeExpression::Primitive(PrimitiveType::I4)]
    );
}

#[test]
fn scope_mismatch() {
    let view = CilView::from_mem(worker()).unwrap();

    assert!(view.method_signature(1).unwrap().return_type.is_void());
    assert!(matches!(
        view.method_signature(2),
        Err(Error::Malformed { .. })
    ));
}

#[test]
fn depth_limit() {
    let view = CilView::from_mem(worker()).unwrap();
    assert!(matches!(
        view.field_signature(1),
        Err(Error::RecursionLimit(50))
    ));

    let config = ValidationConfig {
        max_signature_depth: 64,
        ..ValidationConfig::default()
    };
    let view = CilView::from_mem_with(worker(), &LoadOptions::with_config(config)).unwrap();

    let signature = view.field_signature(1).unwrap();
    let mut ty = &signature.ty;
    let mut depth = 0;
    while let TypeExpression::Vector(inner) = ty {
        ty = inner.as_ref();
        depth += 1;
    }
    assert_eq!(depth, 60);
}
