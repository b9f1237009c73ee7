use itertools::Itertools;

pub fn is_strictly_ascending<T: PartialOrd>(items: &[T]) -> bool {
    items.iter().tuple_windows().all(|(a, b)| a < b)
}

/// Ids present in both sorted, deduplicated lists.
pub fn intersect_ids(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut result = Vec::new();
    let mut a_idx = 0;
    let mut b_idx = 0;

    while a_idx < a.len() && b_idx < b.len() {
        if a[a_idx] == b[b_idx] {
            result.push(a[a_idx]);
            a_idx += 1;
            b_idx += 1;
        } else if a[a_idx] < b[b_idx] {
            a_idx += 1;
        } else {
            b_idx += 1;
        }
    }

    result
}

/// Sorted copy of `ids` without duplicates.
pub fn sorted_ids(ids: &[u32]) -> Vec<u32> {
    ids.iter().copied().sorted_unstable().dedup().collect()
}
