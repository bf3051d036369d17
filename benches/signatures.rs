//! Benchmarks for the signature codec.
//!
//! Parses and encodes the blob shapes a compiler emits most:
//! - Method signatures (plain, instance, generic, by-ref, many parameters)
//! - Field signatures with custom modifiers
//! - Property and local variable signatures
//! - Type and method specifications

extern crate cilmeta;

use cilmeta::metadata::signatures::{
    encode_field_signature, encode_local_var_signature, encode_method_signature,
    parse_field_signature, parse_local_var_signature, parse_method_signature,
    parse_method_spec_signature, parse_property_signature, parse_type_spec_signature,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

#[rustfmt::skip]
const METHOD_SIGNATURES: &[(&str, &[u8])] = &[
    // void M()
    ("void_no_params", &[0x00, 0x00, 0x01]),
    // int32 M(int32, string, bool)
    ("primitives", &[0x00, 0x03, 0x08, 0x08, 0x0E, 0x02]),
    // instance void M(int32)
    ("instance", &[0x20, 0x01, 0x01, 0x08]),
    // !!0 M<T>(!!0)
    ("generic", &[0x30, 0x01, 0x01, 0x1E, 0x00, 0x1E, 0x00]),
    // void M(int32&, string&)
    ("byref", &[0x00, 0x02, 0x01, 0x10, 0x08, 0x10, 0x0E]),
    // int32[] M()
    ("array_return", &[0x00, 0x00, 0x1D, 0x08]),
    // void M(int32, int64, float32, float64, string, object, bool, char)
    ("many_params", &[0x00, 0x08, 0x01, 0x08, 0x0A, 0x0C, 0x0D, 0x0E, 0x1C, 0x02, 0x03]),
    // void M(int32, ..., int64) vararg call site
    ("vararg", &[0x05, 0x02, 0x01, 0x08, 0x41, 0x0A]),
];

fn bench_method_signatures(c: &mut Criterion) {
    let mut group = c.benchmark_group("sig_method");
    for (name, signature) in METHOD_SIGNATURES {
        group.bench_function(*name, |b| {
            b.iter(|| {
                let sig = parse_method_signature(black_box(signature)).unwrap();
                black_box(sig)
            });
        });
    }
    group.finish();
}

fn bench_method_signature_encode(c: &mut Criterion) {
    let method = parse_method_signature(&[0x00, 0x08, 0x01, 0x08, 0x0A, 0x0C, 0x0D, 0x0E, 0x1C, 0x02, 0x03]).unwrap();

    c.bench_function("sig_method_encode_many_params", |b| {
        b.iter(|| {
            let blob = encode_method_signature(black_box(&method)).unwrap();
            black_box(blob)
        });
    });
}

/// volatile int32 with a required and an optional modifier
fn bench_field_signature_modifiers(c: &mut Criterion) {
    #[rustfmt::skip]
    let signature = [
        0x06,
        0x1F, 0x49, // modreq
        0x20, 0x4D, // modopt
        0x08,
    ];

    c.bench_function("sig_field_modifiers", |b| {
        b.iter(|| {
            let sig = parse_field_signature(black_box(&signature)).unwrap();
            black_box(sig)
        });
    });

    let field = parse_field_signature(&signature).unwrap();
    c.bench_function("sig_field_modifiers_encode", |b| {
        b.iter(|| {
            let blob = encode_field_signature(black_box(&field)).unwrap();
            black_box(blob)
        });
    });
}

/// instance string this[int32]
fn bench_property_signature_indexer(c: &mut Criterion) {
    let signature = [0x28, 0x01, 0x0E, 0x08];

    c.bench_function("sig_property_indexer", |b| {
        b.iter(|| {
            let sig = parse_property_signature(black_box(&signature)).unwrap();
            black_box(sig)
        });
    });
}

fn bench_local_var_signatures(c: &mut Criterion) {
    // int32, string, bool, object, pinned int32&, typedref
    #[rustfmt::skip]
    let signature = [
        0x07, 0x06,
        0x08, 0x0E, 0x02, 0x1C,
        0x45, 0x10, 0x08,
        0x16,
    ];

    c.bench_function("sig_locals_mixed", |b| {
        b.iter(|| {
            let sig = parse_local_var_signature(black_box(&signature)).unwrap();
            black_box(sig)
        });
    });

    let locals = parse_local_var_signature(&signature).unwrap();
    c.bench_function("sig_locals_mixed_encode", |b| {
        b.iter(|| {
            let blob = encode_local_var_signature(black_box(&locals)).unwrap();
            black_box(blob)
        });
    });
}

fn bench_specs(c: &mut Criterion) {
    // List<int32>
    let type_spec = [0x15, 0x12, 0x49, 0x01, 0x08];
    // <int32, string>
    let method_spec = [0x0A, 0x02, 0x08, 0x0E];

    c.bench_function("sig_type_spec_generic", |b| {
        b.iter(|| {
            let sig = parse_type_spec_signature(black_box(&type_spec)).unwrap();
            black_box(sig)
        });
    });
    c.bench_function("sig_method_spec", |b| {
        b.iter(|| {
            let sig = parse_method_spec_signature(black_box(&method_spec)).unwrap();
            black_box(sig)
        });
    });
}

criterion_group!(
    benches,
    bench_method_signatures,
    bench_method_signature_encode,
    bench_field_signature_modifiers,
    bench_property_signature_indexer,
    bench_local_var_signatures,
    bench_specs
);
criterion_main!(benches);
