//! Conservative handling of interior references.
//!
//! Under the conservative strategy a heap-targeting inline reference is
//! resolved to its enclosing object through the heap's object-boundary
//! metadata. The enclosing object is kept alive in full, but only the
//! pointer-valued fields embedded inside the referenced inline value are
//! traced onward; the object's other fields are not treated as reached
//! via this reference.

use crate::trace::{HeapModel, Tracer};
use opal_runtime::object::descriptor::{FieldKind, InlineClassDescriptor};
use opal_runtime::tagged::TaggedRef;

/// Mark through one heap-targeting interior reference.
///
/// Returns `false` when the heap cannot name an enclosing object for the
/// address (a stale or misclassified candidate), in which case nothing is
/// marked.
///
/// # Safety
///
/// `address` must be readable for the descriptor's payload size: the
/// reference fields of the inline value are loaded from memory.
pub(crate) unsafe fn mark_through_interior(
    address: usize,
    descriptor: &InlineClassDescriptor,
    heap: &dyn HeapModel,
    tracer: &mut dyn Tracer,
) -> bool {
    let Some(span) = heap.enclosing_object(address) else {
        return false;
    };
    tracer.mark_object(span.start);

    if !descriptor.has_references() {
        return true;
    }
    for field in descriptor.fields() {
        if field.kind != FieldKind::Reference {
            continue;
        }
        let slot = address + field.offset as usize;
        let word = unsafe { std::ptr::read(slot as *const u64) };
        let reference = TaggedRef::from_raw(word);
        if reference.is_regular() {
            let target = word as usize;
            if target != 0 && heap.contains(target) {
                tracer.mark_object(target);
            }
        }
        // An inline-tagged word here would itself be interior; stack
        // discipline keeps those out of heap-resident values and the
        // scanner does not chase them.
    }
    true
}
