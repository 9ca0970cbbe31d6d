//! Root scanning over thread stacks containing tagged references.
//!
//! The scanner walks stack words and classifies each through the tagged
//! encoding: regular pointers become roots directly, inline references are
//! decoded against the vtable and handled by the configured
//! [`ScanStrategy`](crate::config::ScanStrategy). Inline references whose
//! target lies inside a heap object (generic-context values) are the
//! interesting case; everything the scanner does beyond plain marking
//! exists to keep those targets valid across frees and relocations.

mod conservative;
mod interior;

pub use interior::{InteriorRef, InteriorRefTable};

use crate::config::{ScanConfig, ScanStrategy};
use crate::stats::ScanStats;
use crate::trace::{HeapModel, ObjectSpan, Tracer};
use opal_runtime::object::vtable::VTable;
use opal_runtime::tagged::TaggedRef;
use rustc_hash::FxHashSet;

// =============================================================================
// Root Scanner
// =============================================================================

/// Stack-scanning adapter between the runtime's tagged references and the
/// collector's mark phase.
///
/// One scanner serves one collector; all methods take `&mut self` and the
/// collector drives the cycle phases in order:
///
/// 1. [`begin_cycle`](Self::begin_cycle)
/// 2. [`scan_words`](Self::scan_words) per stack region
/// 3. [`finish_scan`](Self::finish_scan)
/// 4. [`may_free`](Self::may_free) / [`relocate_object`](Self::relocate_object)
///    during sweep and compaction
pub struct RootScanner<'t> {
    table: &'t VTable,
    config: ScanConfig,
    interior: InteriorRefTable,
    /// Addresses already reported this cycle, to skip duplicate work.
    seen: FxHashSet<usize>,
    stats: ScanStats,
}

impl<'t> RootScanner<'t> {
    /// Create a scanner over the given vtable.
    ///
    /// Panics if the configuration is invalid.
    pub fn new(table: &'t VTable, config: ScanConfig) -> Self {
        config.validate().expect("invalid scan configuration");
        let interior = InteriorRefTable::with_capacity(config.interior_capacity);
        Self {
            table,
            config,
            interior,
            seen: FxHashSet::default(),
            stats: ScanStats::new(),
        }
    }

    /// Start a collection cycle, discarding the previous cycle's state.
    pub fn begin_cycle(&mut self) {
        self.interior.begin_cycle();
        self.seen.clear();
    }

    /// Scan one region of stack words, reporting reachable objects to
    /// `tracer`.
    ///
    /// # Safety
    ///
    /// `words` must be a faithful snapshot of live stack memory: every
    /// inline-tagged word in it must either decode to a currently valid
    /// value address or fail descriptor lookup. Under the conservative
    /// strategy, decoded heap-interior addresses are dereferenced to walk
    /// embedded reference fields.
    pub unsafe fn scan_words(
        &mut self,
        words: &[u64],
        heap: &dyn HeapModel,
        tracer: &mut dyn Tracer,
    ) {
        self.stats.record_words(words.len());
        for &word in words {
            if word == 0 {
                continue;
            }
            let reference = TaggedRef::from_raw(word);
            if reference.is_regular() {
                let address = word as usize;
                if heap.contains(address) && self.seen.insert(address) {
                    self.stats.record_regular_root();
                    tracer.mark_object(address);
                }
                continue;
            }

            // Inline-tagged word. A stack can hold arbitrary bits that look
            // inline; an unassigned vtable slot identifies those.
            let Some(descriptor) = self.table.descriptor(reference.vtable_index()) else {
                self.stats.record_discarded_candidate();
                continue;
            };
            let address = reference.to_address_assuming(descriptor.align());
            if !heap.contains(address) {
                // The value lives in a stack frame; frame liveness covers
                // it, and its embedded references are stack words the scan
                // reaches on its own.
                self.stats.record_inline_stack_ref();
                continue;
            }

            self.stats.record_interior_heap_ref();
            match self.config.strategy {
                ScanStrategy::Conservative => {
                    if self.seen.insert(address) {
                        let found = unsafe {
                            conservative::mark_through_interior(
                                address, descriptor, heap, tracer,
                            )
                        };
                        if !found {
                            self.stats.record_discarded_candidate();
                        }
                    }
                }
                ScanStrategy::PreciseMaps => {
                    self.interior.record(address);
                    self.stats.record_interior_record();
                }
            }
        }
    }

    /// End the scan phase.
    ///
    /// Under the precise strategy this seals the interior buffer, enabling
    /// the free and relocation queries.
    pub fn finish_scan(&mut self) {
        if self.config.strategy == ScanStrategy::PreciseMaps {
            self.interior.seal();
        }
    }

    /// Whether the object at `span` may be freed this cycle.
    ///
    /// Returns `false` when a live interior reference targets the object;
    /// the collector must keep it for at least this cycle.
    pub fn may_free(&self, span: ObjectSpan) -> bool {
        if self.config.strategy != ScanStrategy::PreciseMaps || self.interior.is_empty() {
            return true;
        }
        if self.interior.pins(span) {
            self.stats.record_free_blocked();
            return false;
        }
        true
    }

    /// Note that the object at `span` moved by `delta` bytes, repointing
    /// every interior record into it. Returns the number of adjusted
    /// records.
    pub fn relocate_object(&mut self, span: ObjectSpan, delta: isize) -> usize {
        if self.config.strategy != ScanStrategy::PreciseMaps {
            return 0;
        }
        let adjusted = self.interior.adjust_for_relocation(span, delta);
        self.stats.record_relocations(adjusted);
        adjusted
    }

    /// The per-cycle interior-reference buffer.
    #[inline]
    pub fn interior_refs(&self) -> &InteriorRefTable {
        &self.interior
    }

    /// Scanner configuration.
    #[inline]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Accumulated statistics.
    #[inline]
    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }
}

// =============================================================================
// Tests
// =============================================================================
