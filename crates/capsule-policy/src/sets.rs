// sets.rs — Ordered set primitives shared by the ingress and egress folds.

use std::collections::HashSet;
use std::hash::Hash;

/// Elements of `a` that also appear in `b`, in `a`'s order.
///
/// Builds a membership set from `b`, so this is O(|a| + |b|).
pub fn intersect_arrays<T>(a: &[T], b: &[T]) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let members: HashSet<&T> = b.iter().collect();
    a.iter().filter(|x| members.contains(x)).cloned().collect()
}

/// Deduplicated concatenation of `a` and `b`.
///
/// First occurrences are kept, so the output is `a` (deduplicated) followed
/// by whatever `b` adds.
pub fn union_arrays<T>(a: &[T], b: &[T]) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen: HashSet<&T> = HashSet::with_capacity(a.len() + b.len());
    a.iter()
        .chain(b.iter())
        .filter(|x| seen.insert(*x))
        .cloned()
        .collect()
}
