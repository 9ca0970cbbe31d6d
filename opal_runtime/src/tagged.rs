//! Tagged reference codec.
//!
//! A `TaggedRef` is one 64-bit word encoding the disjoint union of a regular
//! heap pointer and an inline-class reference. The two forms are
//! distinguishable solely by the low four bits:
//!
//! ```text
//! Regular pointer (16-byte aligned heap address):
//!   ┌──────────────────────────────────────────────────────┬──────┐
//!   │                     address                          │ 0000 │
//!   └──────────────────────────────────────────────────────┴──────┘
//!
//! Inline reference:
//!   ┌───────────────────────────────┬──────────────────────────────┐
//!   │     address >> 3  (45 bits)   │   vtable index  (19 bits)    │
//!   └───────────────────────────────┴──────────────────────────────┘
//!   63                            19 18                            0
//! ```
//!
//! Vtable indices ≡ 0 (mod 16) are never assigned, so an inline reference's
//! low four bits are never `0000`. The three address bits dropped by the
//! `>> 3` are recovered from the vtable index itself: sub-8-byte alignment
//! classes occupy mirrored slots whose low bits equal the referenced value's
//! byte offset within its 8-byte word (see `object::vtable`).
//!
//! Hot paths operate on the raw word; `TaggedValue` is the safe classified
//! wrapper for the external API boundary.

use crate::error::{MetadataError, MetadataResult};
use crate::object::descriptor::{AlignClass, InlineClassDescriptor};
use crate::object::vtable::{VTable, VtIndex, VT_INDEX_BITS, VT_INDEX_MASK};

/// Number of bits in the address field of an inline reference.
pub const ADDR_FIELD_BITS: u32 = 45;

/// Exclusive upper bound on the address field (`address >> 3`).
pub const ADDR_FIELD_LIMIT: u64 = 1 << ADDR_FIELD_BITS;

/// Low-bit mask whose zero pattern marks a regular pointer.
pub const REGULAR_TAG_MASK: u64 = 0xF;

// =============================================================================
// Raw Tagged Word
// =============================================================================

/// A 64-bit tagged reference word.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TaggedRef(u64);

impl TaggedRef {
    /// Reinterpret a raw word.
    #[inline(always)]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw word.
    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this word is a regular heap pointer.
    #[inline(always)]
    pub const fn is_regular(self) -> bool {
        self.0 & REGULAR_TAG_MASK == 0
    }

    /// Whether this word is an inline-class reference.
    #[inline(always)]
    pub const fn is_inline(self) -> bool {
        !self.is_regular()
    }

    // ── Encoding ─────────────────────────────────────────────────────────

    /// Encode a regular heap pointer.
    ///
    /// The address must be 16-byte aligned; that alignment is what keeps
    /// the low-4-bit pattern free for discrimination.
    #[inline(always)]
    pub fn regular(address: usize) -> Self {
        debug_assert_eq!(address % 16, 0, "regular pointers must be 16-byte aligned");
        Self(address as u64)
    }

    /// Encode a reference to the inline value at `address`, described by
    /// `descriptor`.
    ///
    /// Selects the mirror slot matching the address's byte offset within its
    /// 8-byte word. Fails with `AddressSpaceOverflow` when `address >> 3`
    /// does not fit in the 45-bit address field.
    #[inline]
    pub fn inline(address: usize, descriptor: &InlineClassDescriptor) -> MetadataResult<Self> {
        let field = (address as u64) >> 3;
        if field >= ADDR_FIELD_LIMIT {
            return Err(MetadataError::AddressSpaceOverflow { address });
        }
        Ok(Self::inline_unchecked(address, descriptor))
    }

    /// Encode an inline reference without the address-range check.
    ///
    /// The raw fast path for call sites that already operate inside the
    /// supported 48-bit address space.
    #[inline(always)]
    pub fn inline_unchecked(address: usize, descriptor: &InlineClassDescriptor) -> Self {
        let sub = (address as u64) & 0b111;
        debug_assert!(
            (address as u64) >> 3 < ADDR_FIELD_LIMIT,
            "address {:#x} exceeds the 45-bit address field",
            address
        );
        debug_assert_eq!(
            sub % descriptor.align().bytes() as u64,
            0,
            "address {:#x} is not aligned for class '{}'",
            address,
            descriptor.name()
        );
        let slot = descriptor.base_slot().mirror(sub);
        Self(((address as u64) >> 3) << VT_INDEX_BITS | slot.raw() as u64)
    }

    /// Encode an inline reference to an 8-byte-aligned value.
    ///
    /// Statically-known-alignment call sites use this to skip the mirror
    /// arithmetic and the descriptor entirely: an 8-aligned address drops no
    /// bits into the mirror, so the base slot is the slot.
    #[inline(always)]
    pub fn inline_aligned8(address: usize, base_slot: VtIndex) -> Self {
        debug_assert_eq!(address % 8, 0);
        debug_assert!((address as u64) >> 3 < ADDR_FIELD_LIMIT);
        Self(((address as u64) >> 3) << VT_INDEX_BITS | base_slot.raw() as u64)
    }

    // ── Decoding ─────────────────────────────────────────────────────────

    /// Extract the vtable index of an inline reference.
    #[inline(always)]
    pub const fn vtable_index(self) -> VtIndex {
        VtIndex((self.0 & VT_INDEX_MASK) as u32)
    }

    /// Decode this word to the byte address where the referenced value's
    /// fields begin.
    ///
    /// Regular pointers decode to themselves. Inline references recombine
    /// the 45-bit address field with the low bits recovered from the mirror
    /// slot's position. The result is valid only as long as the frame or
    /// object owning the value is alive.
    ///
    /// Panics if an inline reference names an unassigned vtable slot; that
    /// is a corrupt reference and unsafe to continue past.
    #[inline]
    pub fn to_address(self, table: &VTable) -> usize {
        if self.is_regular() {
            return self.0 as usize;
        }
        let index = self.vtable_index();
        let descriptor = table
            .descriptor(index)
            .expect("inline reference names an unassigned vtable slot");
        self.decode_with_mask(descriptor.align().offset_mask())
    }

    /// Decode assuming a statically-known alignment class, skipping the
    /// vtable lookup.
    #[inline(always)]
    pub fn to_address_assuming(self, align: AlignClass) -> usize {
        if self.is_regular() {
            return self.0 as usize;
        }
        self.decode_with_mask(align.offset_mask())
    }

    #[inline(always)]
    fn decode_with_mask(self, mask: u64) -> usize {
        let rounded = (self.0 >> VT_INDEX_BITS) << 3;
        let sub = (self.0 & VT_INDEX_MASK) & mask;
        (rounded + sub) as usize
    }

    /// Classify into the safe wrapper form.
    pub fn classify(self, table: &VTable) -> TaggedValue {
        if self.is_regular() {
            TaggedValue::Regular {
                address: self.0 as usize,
            }
        } else {
            TaggedValue::Inline {
                address: self.to_address(table),
                index: self.vtable_index(),
            }
        }
    }
}

impl std::fmt::Debug for TaggedRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_regular() {
            write!(f, "TaggedRef::Regular({:#x})", self.0)
        } else {
            write!(
                f,
                "TaggedRef::Inline(addr_field={:#x}, vt={})",
                self.0 >> VT_INDEX_BITS,
                self.vtable_index()
            )
        }
    }
}

// =============================================================================
// Safe Classified Wrapper
// =============================================================================

/// The classified form of a tagged reference, for the external API boundary.
///
/// Hot paths stay on `TaggedRef`'s raw word; this variant form exists so
/// collaborators outside the subsystem never touch bit arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaggedValue {
    /// A regular heap pointer.
    Regular {
        /// The full heap address.
        address: usize,
    },
    /// A reference to an inline value's fields.
    Inline {
        /// Decoded byte address of the value's fields.
        address: usize,
        /// Vtable slot the reference carries (mirror, not base).
        index: VtIndex,
    },
}

impl TaggedValue {
    /// Re-encode into the raw word form.
    pub fn encode(self, table: &VTable) -> MetadataResult<TaggedRef> {
        match self {
            Self::Regular { address } => Ok(TaggedRef::regular(address)),
            Self::Inline { address, index } => {
                let descriptor = table
                    .descriptor(index)
                    .ok_or(MetadataError::UnknownVtIndex { index })?;
                TaggedRef::inline(address, descriptor)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
