use std::time::Duration;

/// Nearest-rank percentile over an ascending slice: `sorted[floor((n - 1) * p / 100)]`.
pub(crate) fn nearest_rank(sorted: &[Duration], percent: u64) -> Duration {
    let last = u64::try_from(sorted.len().saturating_sub(1)).unwrap_or(u64::MAX);
    let index = last
        .saturating_mul(percent.min(100))
        .checked_div(100)
        .unwrap_or(0);
    usize::try_from(index)
        .ok()
        .and_then(|idx| sorted.get(idx))
        .copied()
        .unwrap_or_default()
}

pub(crate) fn average(samples: &[Duration]) -> Duration {
    let count = u32::try_from(samples.len()).unwrap_or(u32::MAX);
    if count == 0 {
        return Duration::ZERO;
    }
    let total = samples
        .iter()
        .fold(Duration::ZERO, |acc, sample| acc.saturating_add(*sample));
    total.checked_div(count).unwrap_or_default()
}
