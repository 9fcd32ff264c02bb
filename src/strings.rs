//! Ordered string-set helpers.
//!
//! The module merge logic works on plain string lists rather than hash sets
//! so that every step keeps a well-defined order. Two orderings are in use:
//!
//! - **sorted-unique** ([`unique_sorted`]): the order exposed to scripts
//!   through `__modules__`;
//! - **first-seen-unique** ([`subtract`], [`union_ordered`], [`intersect`]):
//!   the order loaders are materialized in.

use std::collections::HashSet;

/// Returns the distinct strings of `list`, sorted lexicographically.
///
/// Inputs with fewer than two elements are returned as they are.
pub fn unique_sorted<S: AsRef<str>>(list: &[S]) -> Vec<String> {
    let mut out: Vec<String> = list.iter().map(|s| s.as_ref().to_string()).collect();
    if out.len() < 2 {
        return out;
    }
    out.sort();
    out.dedup();
    out
}

/// Removes every occurrence of `removals` from `list`.
///
/// Duplicates among the survivors are dropped as well; the first occurrence
/// of each surviving string keeps its relative position.
pub fn subtract<S: AsRef<str>, R: AsRef<str>>(list: &[S], removals: &[R]) -> Vec<String> {
    let removed: HashSet<&str> = removals.iter().map(|r| r.as_ref()).collect();
    let mut seen = HashSet::with_capacity(list.len());
    let mut out = Vec::with_capacity(list.len());
    for s in list {
        let s = s.as_ref();
        if !removed.contains(s) && seen.insert(s) {
            out.push(s.to_string());
        }
    }
    out
}

/// Appends the strings of `additions` that are not yet in `list`.
///
/// Both sides are de-duplicated; the result is in first-seen order.
pub fn union_ordered<S: AsRef<str>, A: AsRef<str>>(list: &[S], additions: &[A]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(list.len() + additions.len());
    let mut out = Vec::with_capacity(list.len() + additions.len());
    let all = list
        .iter()
        .map(|s| s.as_ref())
        .chain(additions.iter().map(|s| s.as_ref()));
    for s in all {
        if seen.insert(s) {
            out.push(s.to_string());
        }
    }
    out
}

/// Returns the strings of `a` that also occur in `b`, in the order of `a`.
pub fn intersect<S: AsRef<str>, B: AsRef<str>>(a: &[S], b: &[B]) -> Vec<String> {
    let other: HashSet<&str> = b.iter().map(|s| s.as_ref()).collect();
    let mut seen = HashSet::new();
    a.iter()
        .map(|s| s.as_ref())
        .filter(|s| other.contains(s) && seen.insert(*s))
        .map(|s| s.to_string())
        .collect()
}
