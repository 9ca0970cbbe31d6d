//! Collector-facing traits the root-scanning adapter is wired through.
//!
//! The adapter never owns the heap or the mark state; it classifies stack
//! words and reports reachable objects through `Tracer`, consulting the
//! heap's object-boundary metadata through `HeapModel`.

/// The extent of one heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSpan {
    /// Start address of the object.
    pub start: usize,
    /// Object size in bytes.
    pub size: usize,
}

impl ObjectSpan {
    /// Create a span.
    #[inline]
    pub const fn new(start: usize, size: usize) -> Self {
        Self { start, size }
    }

    /// One past the last byte of the object.
    #[inline]
    pub const fn end(&self) -> usize {
        self.start + self.size
    }

    /// Whether an address falls inside the object.
    #[inline]
    pub const fn contains(&self, address: usize) -> bool {
        address >= self.start && address < self.end()
    }
}

/// Sink for reachable objects discovered during root scanning.
///
/// Implementations mark the object and queue it for transitive tracing;
/// marking the same address twice must be harmless.
pub trait Tracer {
    /// Mark the heap object starting at `address` as reachable.
    fn mark_object(&mut self, address: usize);
}

/// The heap's object-boundary metadata, as seen by the scanner.
///
/// Implemented by the collector over its space bookkeeping.
pub trait HeapModel {
    /// Whether an address lies inside GC-managed memory.
    fn contains(&self, address: usize) -> bool;

    /// The object enclosing an (interior) address, if the heap can tell.
    fn enclosing_object(&self, address: usize) -> Option<ObjectSpan>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_containment() {
        let span = ObjectSpan::new(0x1000, 0x40);
        assert!(span.contains(0x1000));
        assert!(span.contains(0x103f));
        assert!(!span.contains(0x1040));
        assert!(!span.contains(0xfff));
        assert_eq!(span.end(), 0x1040);
    }
}
