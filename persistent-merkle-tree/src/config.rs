//! Pool construction settings.

/// Node slots reserved by [`PoolConfig::default`].
pub const DEFAULT_POOL_CAPACITY: u32 = 1 << 20;

/// Settings for [`crate::NodePool::from_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Maximum number of live nodes, not counting the pinned zero subtrees.
    pub capacity: u32,
}

impl PoolConfig {
    /// Config with the given capacity.
    pub fn with_capacity(capacity: u32) -> Self {
        PoolConfig { capacity }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}
