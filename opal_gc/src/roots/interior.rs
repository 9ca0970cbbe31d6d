//! Per-cycle interior-reference buffer (precise stack-map strategy).
//!
//! Interior references are references whose target lies inside, not at the
//! start of, a heap allocation. Ownership of the referenced inline value
//! belongs to a stack frame, so these are modeled as an explicit
//! (interior, enclosing) relation in a transient buffer, never as owning
//! pointers.
//!
//! # Lifecycle
//!
//! One buffer lives for one collection cycle, owned exclusively by the
//! collector:
//!
//! 1. `begin_cycle`: cleared, unsealed
//! 2. `record`: inserts during the stack-scan phase
//! 3. `seal`: sorts by interior address, enabling range queries
//! 4. `pins` / `adjust_for_relocation`: consulted during free and
//!    relocation decisions
//! 5. next `begin_cycle` discards everything

use crate::trace::ObjectSpan;

/// One discovered interior reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteriorRef {
    /// The interior address found on a stack.
    pub interior: usize,
    /// Start address of the enclosing object.
    ///
    /// Zero until known: the precise strategy records without boundary
    /// recovery, and relocation adjustment fills this in with the object's
    /// new start.
    pub enclosing: usize,
}

/// Sorted per-cycle buffer of interior references.
#[derive(Debug)]
pub struct InteriorRefTable {
    records: Vec<InteriorRef>,
    sealed: bool,
}

impl InteriorRefTable {
    /// Create an empty buffer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            sealed: false,
        }
    }

    /// Reset for a new collection cycle.
    pub fn begin_cycle(&mut self) {
        self.records.clear();
        self.sealed = false;
    }

    /// Record an interior reference discovered during the scan phase.
    #[inline]
    pub fn record(&mut self, interior: usize) {
        debug_assert!(!self.sealed, "record after seal");
        self.records.push(InteriorRef {
            interior,
            enclosing: 0,
        });
    }

    /// End the scan phase: sort by interior address for range queries.
    pub fn seal(&mut self) {
        self.records.sort_unstable_by_key(|r| r.interior);
        self.sealed = true;
    }

    /// Whether the buffer is sealed (query-ready).
    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Number of recorded references.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no references were recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records targeting addresses inside `span`.
    pub fn range(&self, span: ObjectSpan) -> &[InteriorRef] {
        debug_assert!(self.sealed, "range query before seal");
        let lo = self.records.partition_point(|r| r.interior < span.start);
        let hi = self.records.partition_point(|r| r.interior < span.end());
        &self.records[lo..hi]
    }

    /// Whether a live interior reference targets the object at `span`.
    ///
    /// A hit blocks freeing that object.
    #[inline]
    pub fn pins(&self, span: ObjectSpan) -> bool {
        !self.range(span).is_empty()
    }

    /// Adjust records for an object relocated from `span` by `delta` bytes.
    ///
    /// Every record inside the old span moves by the same delta and learns
    /// the object's new start. Returns the number of adjusted records.
    pub fn adjust_for_relocation(&mut self, span: ObjectSpan, delta: isize) -> usize {
        debug_assert!(self.sealed, "relocation before seal");
        let lo = self.records.partition_point(|r| r.interior < span.start);
        let hi = self.records.partition_point(|r| r.interior < span.end());
        let new_start = span.start.wrapping_add_signed(delta);
        for record in &mut self.records[lo..hi] {
            record.interior = record.interior.wrapping_add_signed(delta);
            record.enclosing = new_start;
        }
        let moved = hi - lo;
        if moved > 0 {
            // The moved run may now sort elsewhere.
            self.records.sort_unstable_by_key(|r| r.interior);
        }
        moved
    }
}
