//! Root-scan statistics.
//!
//! Counters for monitoring classification decisions and interior-reference
//! pressure across collection cycles.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about root-scanning activity.
#[derive(Debug)]
pub struct ScanStats {
    // =========================================================================
    // Classification
    // =========================================================================
    /// Stack words examined.
    pub words_scanned: AtomicU64,
    /// Regular pointers traced as roots.
    pub regular_roots: AtomicU64,
    /// Inline references targeting stack-allocated values.
    pub inline_stack_refs: AtomicU64,
    /// Inline references targeting heap memory (generic-context values).
    pub interior_heap_refs: AtomicU64,
    /// Inline-looking words discarded as non-references.
    pub discarded_candidates: AtomicU64,

    // =========================================================================
    // Interior-Reference Machinery
    // =========================================================================
    /// Records inserted into the per-cycle interior buffer.
    pub interior_records: AtomicU64,
    /// Free decisions blocked by a live interior reference.
    pub frees_blocked: AtomicU64,
    /// Interior records adjusted during object relocation.
    pub relocations_adjusted: AtomicU64,
}

impl ScanStats {
    /// Create new empty statistics.
    pub const fn new() -> Self {
        Self {
            words_scanned: AtomicU64::new(0),
            regular_roots: AtomicU64::new(0),
            inline_stack_refs: AtomicU64::new(0),
            interior_heap_refs: AtomicU64::new(0),
            discarded_candidates: AtomicU64::new(0),
            interior_records: AtomicU64::new(0),
            frees_blocked: AtomicU64::new(0),
            relocations_adjusted: AtomicU64::new(0),
        }
    }

    /// Record examined stack words.
    #[inline]
    pub fn record_words(&self, count: usize) {
        self.words_scanned.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a regular root.
    #[inline]
    pub fn record_regular_root(&self) {
        self.regular_roots.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stack-targeting inline reference.
    #[inline]
    pub fn record_inline_stack_ref(&self) {
        self.inline_stack_refs.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a heap-targeting interior reference.
    #[inline]
    pub fn record_interior_heap_ref(&self) {
        self.interior_heap_refs.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a discarded candidate word.
    #[inline]
    pub fn record_discarded_candidate(&self) {
        self.discarded_candidates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an interior-buffer insertion.
    #[inline]
    pub fn record_interior_record(&self) {
        self.interior_records.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a blocked free.
    #[inline]
    pub fn record_free_blocked(&self) {
        self.frees_blocked.fetch_add(1, Ordering::Relaxed);
    }

    /// Record adjusted relocation records.
    #[inline]
    pub fn record_relocations(&self, count: usize) {
        self.relocations_adjusted
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

impl Default for ScanStats {
    fn default() -> Self {
        Self::new()
    }
}
