//! Aggregate size estimates.
//!
//! An aggregate is unknown as soon as one contributing size is unknown, and
//! the aggregate of nothing is unknown too.
use crate::kernel::constants::UNKNOWN_SIZE;
use crate::model::entry::{NonPluginEntry, PluginEntry};

/// Sum of `sizes`, or `None` if the set is empty or any member is unknown.
pub fn aggregate<I>(sizes: I) -> Option<u64>
where
    I: IntoIterator<Item = Option<u64>>,
{
    let mut total: Option<u64> = None;
    for size in sizes {
        let size = size?;
        total = Some(total.unwrap_or(0).saturating_add(size));
    }
    total
}

/// Public form of an aggregate: bytes, or [`UNKNOWN_SIZE`].
pub fn reported(size: Option<u64>) -> i64 {
    match size {
        Some(bytes) => i64::try_from(bytes).unwrap_or(i64::MAX),
        None => UNKNOWN_SIZE,
    }
}

/// Bytes to download for the given entries.
pub fn download_size(plugins: &[PluginEntry], non_plugins: &[NonPluginEntry]) -> i64 {
    reported(aggregate(
        plugins.iter().map(|p| p.download_size)
            .chain(non_plugins.iter().map(|n| n.download_size)),
    ))
}

/// Bytes on disk after installing the given entries.
pub fn install_size(plugins: &[PluginEntry], non_plugins: &[NonPluginEntry]) -> i64 {
    reported(aggregate(
        plugins.iter().map(|p| p.install_size)
            .chain(non_plugins.iter().map(|n| n.install_size)),
    ))
}
