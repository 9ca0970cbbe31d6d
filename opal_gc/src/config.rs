//! Root-scan configuration.
//!
//! The scan strategy is selected once per runtime build; defaults suit a
//! runtime whose compiler emits precise stack maps.

/// How candidate inline references found on stacks are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStrategy {
    /// Recover the enclosing object's start from the heap's
    /// object-boundary metadata and mark it directly.
    ///
    /// Requires no compiler cooperation; objects reachable only through
    /// interior references cannot be relocated under this strategy.
    Conservative,

    /// Record every discovered interior reference in a per-cycle buffer,
    /// sorted after the scan phase for range queries.
    ///
    /// Free decisions and relocations consult the buffer; relocation
    /// adjusts the recorded addresses by the object's move delta.
    PreciseMaps,
}

/// Configuration for the root-scanning adapter.
///
/// # Example
///
/// ```ignore
/// use opal_gc::config::{ScanConfig, ScanStrategy};
///
/// let config = ScanConfig {
///     strategy: ScanStrategy::Conservative,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Strategy for interior (inline-class) references.
    ///
    /// Default: `PreciseMaps`
    pub strategy: ScanStrategy,

    /// Initial capacity of the per-cycle interior-reference buffer.
    ///
    /// Interior references into the heap only arise through generic-context
    /// values, so the buffer stays small in practice.
    ///
    /// Default: 1024
    pub interior_capacity: usize,
}

impl ScanConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.strategy == ScanStrategy::PreciseMaps && self.interior_capacity == 0 {
            return Err("interior_capacity must be nonzero under PreciseMaps".to_string());
        }
        Ok(())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy: ScanStrategy::PreciseMaps,
            interior_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ScanConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected_for_precise() {
        let config = ScanConfig {
            strategy: ScanStrategy::PreciseMaps,
            interior_capacity: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_allowed_for_conservative() {
        let config = ScanConfig {
            strategy: ScanStrategy::Conservative,
            interior_capacity: 0,
        };
        assert!(config.validate().is_ok());
    }
}
