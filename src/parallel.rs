use anyhow::{Context, Result};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::debug;

/// Fits `unit(0) .. unit(n - 1)` on a pool of at most `threads` workers and
/// returns the results in unit order.
///
/// Nothing is returned until every unit has finished, so callers may apply a
/// family-wide correction to the output directly. The first error aborts the
/// batch; per-unit fit failures are expected to be folded into `T` instead.
pub fn par_map_ordered<T, F>(
    threads: Option<usize>,
    n: usize,
    label: &str,
    unit: F,
) -> Result<Vec<T>>
where
    F: Fn(usize) -> Result<T> + Sync,
    T: Send,
{
    let threads = cap_threads(threads, n, label);
    let run = || {
        (0..n)
            .into_par_iter()
            .map(|idx| unit(idx).map(|value| (idx, value)))
            .collect::<Vec<Result<(usize, T)>>>()
    };
    let results = match threads {
        Some(threads) => ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .with_context(|| format!("build {label} thread pool"))?
            .install(run),
        None => run(),
    };

    let mut rows = Vec::with_capacity(n);
    for res in results {
        rows.push(res?);
    }
    rows.sort_by_key(|(idx, _)| *idx);
    Ok(rows.into_iter().map(|(_, value)| value).collect())
}

fn cap_threads(threads: Option<usize>, units: usize, label: &str) -> Option<usize> {
    let threads = threads?;
    let capped = threads.min(units.max(1));
    if threads > capped {
        debug!("{label}: {threads} threads requested for {units} fits; using {capped}");
    }
    Some(capped)
}
