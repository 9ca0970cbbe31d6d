//! Error taxonomy for the value-representation subsystem.
//!
//! Two of these conditions are fatal by contract: an address that cannot be
//! represented in the 45-bit address field, and a layout disagreement between
//! concurrently computed instance infos. The rest surface at class-load time
//! and are reported to the loader as ordinary errors.

use crate::object::vtable::VtIndex;

// =============================================================================
// Metadata Errors
// =============================================================================

/// Errors raised by descriptor registration, vtable construction, and
/// instance-info computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// A real address does not fit in the 45-bit address field.
    ///
    /// The encoding supports 48-bit virtual address spaces; anything beyond
    /// that is unrepresentable and aborts the encoding path.
    AddressSpaceOverflow { address: usize },

    /// More vtable slots were requested than the 19-bit index allows.
    ///
    /// Surfaced at class-load time, never as a runtime fault.
    VTableSpaceExhausted { requested: usize },

    /// A hierarchy member declared a larger payload than its root.
    ///
    /// All members of one inline-class hierarchy share the root's padded
    /// size; children never widen the layout.
    ChildWidensHierarchy {
        class: String,
        declared: u32,
        root_size: u32,
    },

    /// An inline class declared a zero-byte payload.
    EmptyInlineClass { class: String },

    /// A type-argument list does not match the class's parameter count.
    ArityMismatch {
        class: String,
        expected: usize,
        actual: usize,
    },

    /// A vtable index did not resolve to a descriptor slot.
    UnknownVtIndex { index: VtIndex },

    /// A generic class id was not found in the definition registry.
    UnknownClass { id: u32 },
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddressSpaceOverflow { address } => {
                write!(f, "address {:#x} exceeds the 45-bit address field", address)
            }
            Self::VTableSpaceExhausted { requested } => {
                write!(
                    f,
                    "inline-class vtable exhausted: slot {} exceeds the 19-bit index space",
                    requested
                )
            }
            Self::ChildWidensHierarchy {
                class,
                declared,
                root_size,
            } => {
                write!(
                    f,
                    "inline class '{}' declares {} bytes but its hierarchy root is {} bytes",
                    class, declared, root_size
                )
            }
            Self::EmptyInlineClass { class } => {
                write!(f, "inline class '{}' has no payload", class)
            }
            Self::ArityMismatch {
                class,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "'{}' expects {} type arguments, got {}",
                    class, expected, actual
                )
            }
            Self::UnknownVtIndex { index } => {
                write!(f, "vtable index {} is not an assigned descriptor slot", index.raw())
            }
            Self::UnknownClass { id } => {
                write!(f, "generic class id {} is not registered", id)
            }
        }
    }
}

impl std::error::Error for MetadataError {}

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;
