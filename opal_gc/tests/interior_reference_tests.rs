//! Integration tests for root scanning over a simulated collection cycle.
//!
//! Coverage:
//! - A full scan → seal → sweep → compact sequence under the precise
//!   strategy, with interior references pinning and following objects
//! - The conservative strategy keeping enclosing objects alive
//! - Mixed stacks of regular pointers, inline references, and junk words

use opal_gc::{
    HeapModel, ObjectSpan, RootScanner, ScanConfig, ScanStrategy, Tracer,
};
use opal_runtime::object::descriptor::InlineClassSpec;
use opal_runtime::object::vtable::{VTable, VTableBuilder, VtIndex};
use opal_runtime::tagged::TaggedRef;
use rustc_hash::FxHashSet;
use std::sync::atomic::Ordering;

// =============================================================================
// Simulated Heap
// =============================================================================

/// A handful of fixed object spans standing in for a heap.
struct FakeHeap {
    spans: Vec<ObjectSpan>,
}

impl FakeHeap {
    fn new(spans: &[ObjectSpan]) -> Self {
        Self {
            spans: spans.to_vec(),
        }
    }
}

impl HeapModel for FakeHeap {
    fn contains(&self, address: usize) -> bool {
        self.spans.iter().any(|s| s.contains(address))
    }
    fn enclosing_object(&self, address: usize) -> Option<ObjectSpan> {
        self.spans.iter().copied().find(|s| s.contains(address))
    }
}

struct MarkSet {
    marked: FxHashSet<usize>,
}

impl MarkSet {
    fn new() -> Self {
        Self {
            marked: FxHashSet::default(),
        }
    }
}

impl Tracer for MarkSet {
    fn mark_object(&mut self, address: usize) {
        self.marked.insert(address);
    }
}

fn value_table() -> (VTable, VtIndex) {
    let mut builder = VTableBuilder::new();
    let desc = builder.register(InlineClassSpec::scalar("Value", 8)).unwrap();
    let slot = desc.base_slot();
    (builder.build(), slot)
}

// =============================================================================
// Precise Strategy: Full Cycle
// =============================================================================

#[test]
fn test_full_precise_cycle_with_compaction() {
    let (table, slot) = value_table();
    let pinned = ObjectSpan::new(0x10_0000, 0x40);
    let garbage = ObjectSpan::new(0x10_1000, 0x40);
    let rooted = ObjectSpan::new(0x10_2000, 0x40);
    let heap = FakeHeap::new(&[pinned, garbage, rooted]);

    let mut scanner = RootScanner::new(&table, ScanConfig::default());
    let mut marks = MarkSet::new();

    // Stack: a regular root, an interior reference into `pinned`, an
    // inline reference to a stack value, and junk.
    let stack = [
        rooted.start as u64,
        TaggedRef::inline_aligned8(pinned.start + 0x10, slot).raw(),
        TaggedRef::inline_aligned8(0x7fff_0000_0008, slot).raw(),
        0u64,
        0x3u64, // inline-tagged bits naming no descriptor
    ];

    scanner.begin_cycle();
    unsafe { scanner.scan_words(&stack, &heap, &mut marks) };
    scanner.finish_scan();

    // Marking covers the regular root only; interior targets defer to the
    // sweep queries.
    assert_eq!(marks.marked.len(), 1);
    assert!(marks.marked.contains(&rooted.start));

    // Sweep: the pinned object survives even though unmarked.
    assert!(!scanner.may_free(pinned));
    assert!(scanner.may_free(garbage));

    // Compaction moves the pinned object; the recorded reference follows.
    let delta = 0x8000isize;
    assert_eq!(scanner.relocate_object(pinned, delta), 1);
    let moved = ObjectSpan::new(0x10_8000, 0x40);
    assert!(!scanner.may_free(moved));
    assert!(scanner.may_free(pinned));
    let record = scanner.interior_refs().range(moved)[0];
    assert_eq!(record.interior, 0x10_8010);
    assert_eq!(record.enclosing, moved.start);

    let stats = scanner.stats();
    assert_eq!(stats.words_scanned.load(Ordering::Relaxed), 5);
    assert_eq!(stats.regular_roots.load(Ordering::Relaxed), 1);
    assert_eq!(stats.interior_heap_refs.load(Ordering::Relaxed), 1);
    assert_eq!(stats.inline_stack_refs.load(Ordering::Relaxed), 1);
    assert_eq!(stats.discarded_candidates.load(Ordering::Relaxed), 1);
}

#[test]
fn test_next_cycle_releases_previous_pins() {
    let (table, slot) = value_table();
    let object = ObjectSpan::new(0x20_0000, 0x40);
    let heap = FakeHeap::new(&[object]);

    let mut scanner = RootScanner::new(&table, ScanConfig::default());
    let mut marks = MarkSet::new();

    scanner.begin_cycle();
    let stack = [TaggedRef::inline_aligned8(object.start + 8, slot).raw()];
    unsafe { scanner.scan_words(&stack, &heap, &mut marks) };
    scanner.finish_scan();
    assert!(!scanner.may_free(object));

    // The frame died; the next cycle's scan sees no reference.
    scanner.begin_cycle();
    unsafe { scanner.scan_words(&[], &heap, &mut marks) };
    scanner.finish_scan();
    assert!(scanner.may_free(object));
}

#[test]
fn test_multiple_regions_accumulate_into_one_cycle() {
    let (table, slot) = value_table();
    let object = ObjectSpan::new(0x30_0000, 0x100);
    let heap = FakeHeap::new(&[object]);

    let mut scanner = RootScanner::new(&table, ScanConfig::default());
    let mut marks = MarkSet::new();

    scanner.begin_cycle();
    // Two stacks, each holding one interior reference into the object.
    let stack_a = [TaggedRef::inline_aligned8(object.start + 0x10, slot).raw()];
    let stack_b = [TaggedRef::inline_aligned8(object.start + 0x80, slot).raw()];
    unsafe {
        scanner.scan_words(&stack_a, &heap, &mut marks);
        scanner.scan_words(&stack_b, &heap, &mut marks);
    }
    scanner.finish_scan();

    assert_eq!(scanner.interior_refs().len(), 2);
    assert_eq!(scanner.interior_refs().range(object).len(), 2);
}

// =============================================================================
// Conservative Strategy
// =============================================================================

#[test]
fn test_conservative_keeps_enclosing_alive() {
    let (table, slot) = value_table();

    // Real backing memory so the field walk has something to read.
    let object = [0u64; 8];
    let base = object.as_ptr() as usize;
    let span = ObjectSpan::new(base, 64);
    let heap = FakeHeap::new(&[span]);

    let config = ScanConfig {
        strategy: ScanStrategy::Conservative,
        ..Default::default()
    };
    let mut scanner = RootScanner::new(&table, config);
    let mut marks = MarkSet::new();

    scanner.begin_cycle();
    let stack = [TaggedRef::inline_aligned8(base + 0x18, slot).raw()];
    unsafe { scanner.scan_words(&stack, &heap, &mut marks) };
    scanner.finish_scan();

    // Marked directly at its start; nothing recorded, nothing pinned.
    assert!(marks.marked.contains(&base));
    assert!(scanner.interior_refs().is_empty());
    assert!(scanner.may_free(span)); // liveness came from the mark instead
}
