//! Load ordering: flat batch or power-of-two importance tiers.

use crate::config::LargeConfig;

/// Order in which frame indices are fetched during `init()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPlan {
    /// Every frame in one bounded batch
    Flat(Vec<usize>),
    /// Tier 0 blocks initialization, the rest stream in afterwards
    Progressive(Vec<Vec<usize>>),
}

impl LoadPlan {
    pub fn new(total: usize, large: &LargeConfig) -> Self {
        if large.enabled {
            Self::Progressive(build_tiers(total, large.factor))
        } else {
            Self::Flat((0..total).collect())
        }
    }

    pub fn is_progressive(&self) -> bool {
        matches!(self, Self::Progressive(_))
    }
}

/// Strides `[factor, factor/2, ..., 2, 1]`.
pub fn factor_list(factor: usize) -> Vec<usize> {
    let mut list = Vec::new();
    let mut stride = factor.max(1);
    while stride > 1 {
        list.push(stride);
        stride /= 2;
    }
    list.push(1);
    list
}

/// Partition `0..total` into tiers by dyadic stride.
///
/// Tier 0 always holds the first and last frame plus every multiple of `factor`;
/// tier `j` holds the remaining multiples of `factor >> j`; the final tier
/// (stride 1) takes whatever is left. Tier 0 is sorted ascending.
pub fn build_tiers(total: usize, factor: usize) -> Vec<Vec<usize>> {
    let strides = factor_list(factor);
    let mut tiers: Vec<Vec<usize>> = vec![Vec::new(); strides.len()];
    if total == 0 {
        return tiers;
    }

    let last = total - 1;
    tiers[0].push(0);
    if last != 0 {
        tiers[0].push(last);
    }

    for index in 1..last {
        if let Some(tier) = strides.iter().position(|stride| index % stride == 0) {
            tiers[tier].push(index);
        }
    }

    tiers[0].sort_unstable();
    tiers
}
