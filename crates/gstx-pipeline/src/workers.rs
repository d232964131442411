//! # Worker Pool
//!
//! Deterministic chunked map for row-level work. Items are split into
//! contiguous chunks, one per worker; results come back in input order, so
//! worker count never changes the output.

/// Map `items` through `f` across up to `workers` threads, preserving
/// input order. `workers <= 1` (or small inputs) runs inline.
pub fn parallel_map<T, R, F>(items: Vec<T>, workers: usize, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let workers = workers.max(1);
    if workers == 1 || items.len() < 2 {
        return items.into_iter().map(f).collect();
    }

    let chunk_size = items.len().div_ceil(workers);
    let mut chunks: Vec<Vec<T>> = Vec::new();
    let mut current = Vec::with_capacity(chunk_size);
    for item in items {
        current.push(item);
        if current.len() == chunk_size {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    let f = &f;
    let mut results: Vec<Vec<R>> = Vec::with_capacity(chunks.len());
    std::thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| scope.spawn(move || chunk.into_iter().map(f).collect::<Vec<R>>()))
            .collect();
        for handle in handles {
            match handle.join() {
                Ok(chunk_results) => results.push(chunk_results),
                Err(_) => {
                    // A panicking worker drops its chunk; surface loudly.
                    tracing::error!("worker thread panicked; chunk results lost");
                }
            }
        }
    });
    results.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_input_order() {
        let items: Vec<i64> = (0..1000).collect();
        let doubled = parallel_map(items.clone(), 4, |x| x * 2);
        let expected: Vec<i64> = items.iter().map(|x| x * 2).collect();
        assert_eq!(doubled, expected);
    }

    #[test]
    fn worker_count_does_not_change_output() {
        let items: Vec<i64> = (0..97).collect();
        let one = parallel_map(items.clone(), 1, |x| x + 1);
        let four = parallel_map(items.clone(), 4, |x| x + 1);
        let many = parallel_map(items, 16, |x| x + 1);
        assert_eq!(one, four);
        assert_eq!(four, many);
    }

    #[test]
    fn empty_and_single() {
        assert!(parallel_map(Vec::<i32>::new(), 4, |x| x).is_empty());
        assert_eq!(parallel_map(vec![7], 4, |x| x * 3), vec![21]);
    }
}
