//! Tagged-Reference and Layout Performance Benchmarks
//!
//! Benchmarks for the hot paths of the value-representation subsystem:
//! encoding and decoding tagged references, and the instance-info lookup
//! that generic call sites hit on every specialized allocation.
//!
//! # Benchmark Categories
//!
//! 1. **Codec**: inline encode/decode across alignment classes
//! 2. **Instance Info**: cached lookup vs first-time layout computation
//!
//! # Performance Targets
//!
//! - Inline decode (known alignment): a few arithmetic ops, no memory
//! - Inline decode (vtable path): one array read over the arithmetic
//! - Cached `get_or_create`: one lock-free map probe

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use opal_runtime::object::descriptor::{InlineClassSpec, MethodTable};
use opal_runtime::object::instance_info::{
    FixedField, GenericClassDef, GenericClassId, InstanceInfoRepository, RegularClassId, TypeArg,
};
use opal_runtime::object::vtable::{VTable, VTableBuilder, VtIndex};
use opal_runtime::tagged::TaggedRef;
use std::sync::Arc;

// =============================================================================
// Benchmark Helpers
// =============================================================================

/// Build a vtable holding one scalar class per alignment class.
fn codec_fixture() -> (VTable, Vec<(&'static str, VtIndex)>) {
    let mut builder = VTableBuilder::new();
    let mut slots = Vec::new();
    for (name, size) in [("byte", 1u32), ("half", 2), ("word", 4), ("long", 8)] {
        let desc = builder.register(InlineClassSpec::scalar(name, size)).unwrap();
        slots.push((name, desc.base_slot()));
    }
    (builder.build(), slots)
}

/// `Container[T]` with one fixed header word and one generic field.
fn container_def() -> GenericClassDef {
    GenericClassDef::new(
        GenericClassId(1),
        "Container",
        1,
        vec![FixedField::scalar(8, 8)],
        vec![0],
        MethodTable::empty(),
    )
}

// =============================================================================
// Codec Benchmarks
// =============================================================================

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let (table, classes) = codec_fixture();

    for (name, slot) in &classes {
        let desc = Arc::clone(table.descriptor(*slot).unwrap());
        let align = desc.align();
        let address = 0x7f00_0000_1000usize + align.bytes() as usize;

        group.bench_with_input(BenchmarkId::new("encode", name), &address, |b, &addr| {
            b.iter(|| black_box(TaggedRef::inline(black_box(addr), &desc).unwrap()))
        });

        let encoded = TaggedRef::inline(address, &desc).unwrap();
        group.bench_with_input(BenchmarkId::new("decode", name), &encoded, |b, &r| {
            b.iter(|| black_box(r.to_address(&table)))
        });
        group.bench_with_input(
            BenchmarkId::new("decode_known_align", name),
            &encoded,
            |b, &r| b.iter(|| black_box(r.to_address_assuming(align))),
        );
    }

    group.bench_function("regular_passthrough", |b| {
        let r = TaggedRef::regular(0x7f00_0000_1000);
        b.iter(|| black_box(r.to_address(&table)))
    });

    group.finish();
}

// =============================================================================
// Instance Info Benchmarks
// =============================================================================

fn bench_instance_info(c: &mut Criterion) {
    let mut group = c.benchmark_group("instance_info");

    let mut builder = VTableBuilder::new();
    let elem = builder.register(InlineClassSpec::scalar("Elem", 8)).unwrap();
    let slot = elem.base_slot();
    let table = builder.build();

    // Steady-state path generic allocation sites hit after warmup.
    group.bench_function("get_or_create_cached", |b| {
        let repo = InstanceInfoRepository::new();
        let def = repo.register_class(container_def());
        let args = [TypeArg::Inline(slot)];
        let _ = repo.get_or_create_for(&def, &args, &table).unwrap();

        b.iter(|| black_box(repo.get_or_create_for(&def, black_box(&args), &table).unwrap()))
    });

    group.bench_function("get_or_create_cached_regular", |b| {
        let repo = InstanceInfoRepository::new();
        let def = repo.register_class(container_def());
        let args = [TypeArg::Regular(RegularClassId(100))];
        let _ = repo.get_or_create_for(&def, &args, &table).unwrap();

        b.iter(|| black_box(repo.get_or_create_for(&def, black_box(&args), &table).unwrap()))
    });

    // First use of a shape: layout computation plus publication.
    group.bench_function("get_or_create_cold", |b| {
        b.iter_batched(
            || {
                let repo = InstanceInfoRepository::new();
                let def = repo.register_class(container_def());
                (repo, def)
            },
            |(repo, def)| {
                black_box(
                    repo.get_or_create_for(&def, &[TypeArg::Inline(slot)], &table)
                        .unwrap(),
                )
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_codec, bench_instance_info);
criterion_main!(benches);
