//! Benchmarks for signature decoding.
//!
//! Covers the shapes that dominate real modules: small method signatures, generic
//! instantiations resolved against a scope, multi-dimensional arrays, locals and deeply nested
//! types close to the recursion limit.

extern crate clrmap;

use clrmap::metadata::{
    signatures::{
        parse_field_signature, parse_local_var_signature, parse_method_signature,
        parse_method_spec_signature, parse_type_spec_signature, GenericScope, SignatureParser,
    },
    token::Token,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

/// Signature: void Method()
fn bench_method_void(c: &mut Criterion) {
    let signature = [0x00, 0x00, 0x01];
    let scope = GenericScope::none();

    c.bench_function("sig_method_void", |b| {
        b.iter(|| {
            let sig = parse_method_signature(black_box(&signature), &scope).unwrap();
            black_box(sig)
        });
    });
}

/// Signature: instance int32 Method(string, int32[]&, class [TypeRef 0x12])
fn bench_method_instance(c: &mut Criterion) {
    let signature = [0x20, 0x03, 0x08, 0x0E, 0x10, 0x1D, 0x08, 0x12, 0x49];
    let scope = GenericScope::none();

    c.bench_function("sig_method_instance", |b| {
        b.iter(|| {
            let sig = parse_method_signature(black_box(&signature), &scope).unwrap();
            black_box(sig)
        });
    });
}

/// Signature: instance !0 Get<U>(!!0) resolved against its owners
fn bench_method_generic_resolved(c: &mut Criterion) {
    let signature = [0x30, 0x01, 0x01, 0x13, 0x00, 0x1E, 0x00];
    let scope = GenericScope::none()
        .with_type_params(vec![Token::new(0x2A00_0001)])
        .with_method_params(vec![Token::new(0x2A00_0002)]);

    c.bench_function("sig_method_generic_resolved", |b| {
        b.iter(|| {
            let sig = parse_method_signature(black_box(&signature), &scope).unwrap();
            black_box(sig)
        });
    });
}

/// Signature: vararg void printf(string, ..., int32, float64)
fn bench_method_varargs(c: &mut Criterion) {
    let signature = [0x05, 0x03, 0x01, 0x0E, 0x41, 0x08, 0x0D];
    let scope = GenericScope::none();

    c.bench_function("sig_method_varargs", |b| {
        b.iter(|| {
            let sig = parse_method_signature(black_box(&signature), &scope).unwrap();
            black_box(sig)
        });
    });
}

/// Field: int32[0...4, 0...9, 2...]
fn bench_field_array(c: &mut Criterion) {
    let signature = [0x06, 0x14, 0x08, 0x03, 0x02, 0x05, 0x0A, 0x03, 0x00, 0x00, 0x04];
    let scope = GenericScope::none();

    c.bench_function("sig_field_array", |b| {
        b.iter(|| {
            let sig = parse_field_signature(black_box(&signature), &scope).unwrap();
            black_box(sig)
        });
    });
}

/// Locals: int32, string, object, int32[], class [TypeRef 1], valuetype [TypeDef 2]
fn bench_locals(c: &mut Criterion) {
    let signature = [
        0x07, 0x06, 0x08, 0x0E, 0x1C, 0x1D, 0x08, 0x12, 0x05, 0x11, 0x08,
    ];
    let scope = GenericScope::none();

    c.bench_function("sig_locals", |b| {
        b.iter(|| {
            let sig = parse_local_var_signature(black_box(&signature), &scope).unwrap();
            black_box(sig)
        });
    });
}

/// TypeSpec: Dictionary<string, List<int32>>
fn bench_type_spec_nested_generic(c: &mut Criterion) {
    let signature = [
        0x15, 0x12, 0x49, 0x02, 0x0E, 0x15, 0x12, 0x4D, 0x01, 0x08,
    ];
    let scope = GenericScope::open();

    c.bench_function("sig_type_spec_nested_generic", |b| {
        b.iter(|| {
            let sig = parse_type_spec_signature(black_box(&signature), &scope).unwrap();
            black_box(sig)
        });
    });
}

/// MethodSpec: <int32, string, bool>
fn bench_method_spec(c: &mut Criterion) {
    let signature = [0x0A, 0x03, 0x08, 0x0E, 0x02];
    let scope = GenericScope::open();

    c.bench_function("sig_method_spec", |b| {
        b.iter(|| {
            let sig = parse_method_spec_signature(black_box(&signature), &scope).unwrap();
            black_box(sig)
        });
    });
}

/// TypeSpec nested 48 pointers deep, just below the default recursion limit
fn bench_deep_nesting(c: &mut Criterion) {
    let mut signature = vec![0x0F; 48];
    signature.push(0x08);
    let scope = GenericScope::none();

    c.bench_function("sig_deep_nesting", |b| {
        b.iter(|| {
            let sig = SignatureParser::new(black_box(&signature), &scope)
                .parse_type_spec_signature()
                .unwrap();
            black_box(sig)
        });
    });
}

criterion_group!(
    benches,
    bench_method_void,
    bench_method_instance,
    bench_method_generic_resolved,
    bench_method_varargs,
    bench_field_array,
    bench_locals,
    bench_type_spec_nested_generic,
    bench_method_spec,
    bench_deep_nesting,
);
criterion_main!(benches);
