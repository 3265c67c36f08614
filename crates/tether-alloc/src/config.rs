//! Configuration for the system allocator.

use std::error::Error;
use std::fmt;

use tether_core::Fault;

/// Configuration for [`SystemAllocator`](crate::SystemAllocator).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemAllocatorConfig {
    /// Alignment of every returned block, in bytes.
    ///
    /// Default: 16. Must be a power of two, at least
    /// `align_of::<usize>()` (the block header lives in the alignment
    /// padding) and at most [`MAX_ALIGNMENT`](Self::MAX_ALIGNMENT).
    pub alignment: usize,

    /// Zero every block before returning it.
    ///
    /// Default: `false`.
    pub zero_fill: bool,

    /// Largest single request, in bytes. Larger requests fail with a null
    /// result rather than reaching the system allocator.
    pub max_allocation: usize,
}

impl SystemAllocatorConfig {
    /// Default block alignment.
    pub const DEFAULT_ALIGNMENT: usize = 16;

    /// Largest accepted alignment (one 4 KiB page).
    pub const MAX_ALIGNMENT: usize = 4096;

    /// Default request ceiling: half the address space.
    pub const DEFAULT_MAX_ALLOCATION: usize = isize::MAX as usize / 2;

    /// Smallest accepted alignment.
    pub const fn min_alignment() -> usize {
        std::mem::align_of::<usize>()
    }

    /// Check every field, returning the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.alignment.is_power_of_two() {
            return Err(ConfigError::AlignmentNotPowerOfTwo {
                alignment: self.alignment,
            });
        }
        if self.alignment < Self::min_alignment() || self.alignment > Self::MAX_ALIGNMENT {
            return Err(ConfigError::AlignmentOutOfRange {
                alignment: self.alignment,
            });
        }
        if self.max_allocation == 0 {
            return Err(ConfigError::ZeroMaxAllocation);
        }
        Ok(())
    }
}

impl Default for SystemAllocatorConfig {
    fn default() -> Self {
        Self {
            alignment: Self::DEFAULT_ALIGNMENT,
            zero_fill: false,
            max_allocation: Self::DEFAULT_MAX_ALLOCATION,
        }
    }
}

/// Rejected allocator configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `alignment` is not a power of two.
    AlignmentNotPowerOfTwo {
        /// The rejected alignment.
        alignment: usize,
    },
    /// `alignment` is below the header size or above one page.
    AlignmentOutOfRange {
        /// The rejected alignment.
        alignment: usize,
    },
    /// `max_allocation` is zero.
    ZeroMaxAllocation,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlignmentNotPowerOfTwo { alignment } => {
                write!(f, "alignment {alignment} is not a power of two")
            }
            Self::AlignmentOutOfRange { alignment } => write!(
                f,
                "alignment {alignment} outside {}..={}",
                SystemAllocatorConfig::min_alignment(),
                SystemAllocatorConfig::MAX_ALIGNMENT
            ),
            Self::ZeroMaxAllocation => write!(f, "max_allocation must be non-zero"),
        }
    }
}

impl Error for ConfigError {}

impl From<ConfigError> for Fault {
    fn from(e: ConfigError) -> Self {
        Fault::invalid_argument(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::StatusCode;

    #[test]
    fn default_config_is_valid() {
        let config = SystemAllocatorConfig::default();
        assert_eq!(config.alignment, 16);
        assert!(!config.zero_fill);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_alignment() {
        let config = SystemAllocatorConfig {
            alignment: 24,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::AlignmentNotPowerOfTwo { alignment: 24 })
        );
    }

    #[test]
    fn rejects_alignment_outside_range() {
        for alignment in [1, 2, 8192] {
            if alignment >= SystemAllocatorConfig::min_alignment()
                && alignment <= SystemAllocatorConfig::MAX_ALIGNMENT
            {
                continue;
            }
            let config = SystemAllocatorConfig {
                alignment,
                ..Default::default()
            };
            assert_eq!(
                config.validate(),
                Err(ConfigError::AlignmentOutOfRange { alignment })
            );
        }
    }

    #[test]
    fn rejects_zero_max_allocation() {
        let config = SystemAllocatorConfig {
            max_allocation: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxAllocation));
    }

    #[test]
    fn config_error_becomes_invalid_argument() {
        let fault = Fault::from(ConfigError::ZeroMaxAllocation);
        assert_eq!(fault.status(), StatusCode::InvalidArgument);
        assert_eq!(fault.message(), Some("max_allocation must be non-zero"));
    }
}
