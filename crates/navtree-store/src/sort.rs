//! Pluggable child ordering
//!
//! A sorting spec is an ordered list of algorithm names joined by `:`, for
//! example `Folders first:Alphabetical`. The engine turns a spec into a
//! composite comparator (cached per spec string) that evaluates its sorters
//! left to right. A spec made only of `Default order` has no comparator, so
//! children keep the structure provider's order.

use dashmap::DashMap;
use navtree_core::NodeId;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_ORDER: &str = "Default order";
pub const FOLDERS_FIRST: &str = "Folders first";
pub const ALPHABETICAL: &str = "Alphabetical";
pub const ALPHA_NUMERICAL: &str = "Alpha-numerical";

pub const SPEC_DELIMITER: char = ':';

/// What a sorter gets to see of a child.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortEntry {
    pub id: NodeId,
    pub name: String,
    pub allows_children: bool,
    /// Index in the parent's structure provider.
    pub position: usize,
    pub creation_seq: u64,
}

pub trait NodeSorter: Send + Sync {
    /// Name used in sorting specs.
    fn algorithm_name(&self) -> &str;

    fn description(&self) -> &str { "" }

    /// Whether `compare` reads [`SortEntry::position`]. Entries handed to
    /// sorters that return false carry `usize::MAX` there.
    fn uses_position(&self) -> bool { false }

    fn compare(&self, a: &SortEntry, b: &SortEntry) -> Ordering;
}

// ---------------------------------------------------------------------------
// Built-in sorters
// ---------------------------------------------------------------------------

pub struct DefaultOrder;

impl NodeSorter for DefaultOrder {
    fn algorithm_name(&self) -> &str { DEFAULT_ORDER }

    fn description(&self) -> &str { "Order in which the nodes were added" }

    fn uses_position(&self) -> bool { true }

    fn compare(&self, a: &SortEntry, b: &SortEntry) -> Ordering {
        a.position
            .cmp(&b.position)
            .then(a.creation_seq.cmp(&b.creation_seq))
    }
}

pub struct FoldersFirst;

impl NodeSorter for FoldersFirst {
    fn algorithm_name(&self) -> &str { FOLDERS_FIRST }

    fn description(&self) -> &str { "Nodes that can hold children before the others" }

    fn compare(&self, a: &SortEntry, b: &SortEntry) -> Ordering {
        b.allows_children.cmp(&a.allows_children)
    }
}

pub struct Alphabetical;

impl NodeSorter for Alphabetical {
    fn algorithm_name(&self) -> &str { ALPHABETICAL }

    fn description(&self) -> &str { "Case-insensitive by name" }

    fn compare(&self, a: &SortEntry, b: &SortEntry) -> Ordering {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    }
}

pub struct AlphaNumerical;

impl NodeSorter for AlphaNumerical {
    fn algorithm_name(&self) -> &str { ALPHA_NUMERICAL }

    fn description(&self) -> &str { "By name, numbers compared by value" }

    fn compare(&self, a: &SortEntry, b: &SortEntry) -> Ordering {
        compare_alpha_numeric(&a.name, &b.name).then_with(|| a.name.cmp(&b.name))
    }
}

/// Compare names chunk by chunk; runs of ASCII digits compare by value.
pub fn compare_alpha_numeric(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_digits(x), is_digits(y)) {
                    (true, true) => compare_digits(x, y),
                    _ => x.to_lowercase().cmp(&y.to_lowercase()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().next().is_some_and(|b| b.is_ascii_digit())
}

fn compare_digits(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

// ---------------------------------------------------------------------------
// CompositeComparator
// ---------------------------------------------------------------------------

/// Sorters of one spec, evaluated left to right; the first non-equal wins.
pub struct CompositeComparator {
    spec: String,
    sorters: Vec<Arc<dyn NodeSorter>>,
}

impl CompositeComparator {
    pub fn spec(&self) -> &str { &self.spec }

    pub fn compare(&self, a: &SortEntry, b: &SortEntry) -> Ordering {
        for sorter in &self.sorters {
            let ord = sorter.compare(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    pub fn uses_position(&self) -> bool { self.sorters.iter().any(|s| s.uses_position()) }

    pub fn algorithm_names(&self) -> Vec<&str> {
        self.sorters.iter().map(|s| s.algorithm_name()).collect()
    }
}

// ---------------------------------------------------------------------------
// SortEngine
// ---------------------------------------------------------------------------

pub struct SortEngine {
    sorters: RwLock<Vec<Arc<dyn NodeSorter>>>,
    cache: DashMap<String, Option<Arc<CompositeComparator>>>,
}

impl Default for SortEngine {
    fn default() -> Self { Self::new() }
}

impl SortEngine {
    /// An engine without any algorithm.
    pub fn new() -> Self {
        Self {
            sorters: RwLock::new(Vec::new()),
            cache: DashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let engine = Self::new();
        engine.register(Arc::new(DefaultOrder));
        engine.register(Arc::new(FoldersFirst));
        engine.register(Arc::new(Alphabetical));
        engine.register(Arc::new(AlphaNumerical));
        engine
    }

    /// Register an algorithm. A sorter with the same name is replaced.
    pub fn register(&self, sorter: Arc<dyn NodeSorter>) {
        info!(algorithm = sorter.algorithm_name(), "registering sorter");
        {
            let mut sorters = self.sorters.write();
            match sorters
                .iter()
                .position(|s| s.algorithm_name() == sorter.algorithm_name())
            {
                Some(idx) => sorters[idx] = sorter,
                None => sorters.push(sorter),
            }
        }
        self.cache.clear();
    }

    /// Registered algorithms as (name, description), in registration order.
    pub fn algorithms(&self) -> Vec<(String, String)> {
        self.sorters
            .read()
            .iter()
            .map(|s| (s.algorithm_name().to_string(), s.description().to_string()))
            .collect()
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn NodeSorter>> {
        self.sorters
            .read()
            .iter()
            .find(|s| s.algorithm_name() == name)
            .cloned()
    }

    /// Comparator for `spec`, or `None` when the spec keeps provider order.
    pub fn comparator(&self, spec: &str) -> Option<Arc<CompositeComparator>> {
        if let Some(hit) = self.cache.get(spec) {
            return hit.clone();
        }

        let names = parse_spec(spec);
        let comparator = if names.iter().all(|n| n == DEFAULT_ORDER) {
            None
        } else {
            let mut sorters = Vec::with_capacity(names.len());
            for name in &names {
                match self.lookup(name) {
                    Some(sorter) => sorters.push(sorter),
                    None => warn!(algorithm = %name, spec, "unknown sorting algorithm, skipped"),
                }
            }
            if sorters.iter().all(|s| s.algorithm_name() == DEFAULT_ORDER) {
                None
            } else {
                Some(Arc::new(CompositeComparator {
                    spec: spec.to_string(),
                    sorters,
                }))
            }
        };
        self.cache.insert(spec.to_string(), comparator.clone());
        comparator
    }

    /// Stable sort of `entries` by `spec`. Returns false if the spec keeps
    /// provider order (entries untouched).
    pub fn sort(&self, spec: &str, entries: &mut [SortEntry]) -> bool {
        match self.comparator(spec) {
            Some(cmp) => {
                entries.sort_by(|a, b| cmp.compare(a, b));
                true
            }
            None => false,
        }
    }

    /// Where `entry` goes among the already sorted `siblings`. Entries are
    /// built through `to_entry` only for the probed siblings. Appends when
    /// the spec keeps provider order.
    pub fn insertion_index<T>(
        &self,
        spec: &str,
        siblings: &[T],
        entry: &SortEntry,
        to_entry: impl Fn(&T) -> SortEntry,
    ) -> usize {
        match self.comparator(spec) {
            Some(cmp) => siblings.partition_point(|s| cmp.compare(&to_entry(s), entry) != Ordering::Greater),
            None => siblings.len(),
        }
    }

    pub fn cached_specs(&self) -> usize { self.cache.len() }
}

/// Split a spec into algorithm names, dropping blanks.
pub fn parse_spec(spec: &str) -> Vec<String> {
    spec.split(SPEC_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_spec<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<S> = names.into_iter().collect();
    names
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(&SPEC_DELIMITER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_numeric_compares_digit_runs_by_value() {
        assert_eq!(compare_alpha_numeric("run2", "run10"), Ordering::Less);
        assert_eq!(compare_alpha_numeric("run10", "run9"), Ordering::Greater);
        assert_eq!(compare_alpha_numeric("a007", "a7"), Ordering::Equal);
        assert_eq!(compare_alpha_numeric("Beta", "alpha"), Ordering::Greater);
        assert_eq!(compare_alpha_numeric("x", "x1"), Ordering::Less);
    }

    #[test]
    fn spec_round_trip() {
        let names = parse_spec("Folders first: Alphabetical::");
        assert_eq!(names, vec!["Folders first", "Alphabetical"]);
        assert_eq!(join_spec(&names), "Folders first:Alphabetical");
        assert!(parse_spec("").is_empty());
    }

    fn entry(id: u64, name: &str) -> SortEntry {
        SortEntry {
            id: NodeId::new(id),
            name: name.to_string(),
            allows_children: false,
            position: usize::MAX,
            creation_seq: id,
        }
    }

    #[test]
    fn insertion_index_builds_only_probed_entries() {
        let engine = SortEngine::with_builtins();
        let names: Vec<String> = (0..1024).map(|i| format!("n{i:04}")).collect();
        let built = std::cell::Cell::new(0usize);
        let index = engine.insertion_index(ALPHABETICAL, &names, &entry(9999, "n0500x"), |name| {
            built.set(built.get() + 1);
            entry(0, name)
        });
        assert_eq!(index, 501);
        assert!(built.get() <= 11, "built {} entries", built.get());

        let untouched = engine.insertion_index(DEFAULT_ORDER, &names, &entry(9999, "a"), |name| {
            built.set(built.get() + 1000);
            entry(0, name)
        });
        assert_eq!(untouched, names.len());
        assert!(built.get() < 1000);
    }

    #[test]
    fn position_is_only_needed_by_default_order() {
        let engine = SortEngine::with_builtins();
        assert!(!engine.comparator(ALPHABETICAL).unwrap().uses_position());
        assert!(engine
            .comparator("Folders first:Default order")
            .unwrap()
            .uses_position());
    }
}
