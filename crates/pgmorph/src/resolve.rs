//! Dependency-ordered resolution.
//!
//! A pure topological ordering over already-fetched identity relations:
//! every recorded parent present in the input precedes its children, and
//! items with no recorded dependency keep their original relative order.
//! Used to make catalog dumps replayable in one pass.

use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::ident::Oid;

/// Items the resolver can order.
pub trait Identify {
    /// Catalog identity, when known. Items without one cannot be depended
    /// on and are emitted at their original turn.
    fn identity(&self) -> Option<Oid>;

    /// Human-readable label used in cycle reports.
    fn label(&self) -> String;
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Orders `items` so that every recorded parent precedes its children.
///
/// `deps` maps an item's identity to the identities it depends on; absent
/// entries mean "no known dependency", and parents not present in the item
/// set are ignored. A cyclic relation fails closed with
/// [`Error::CycleDetected`] instead of recursing forever.
pub fn resolve<T: Identify>(items: Vec<T>, deps: &HashMap<Oid, BTreeSet<Oid>>) -> Result<Vec<T>> {
    let position: HashMap<Oid, usize> = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| item.identity().map(|oid| (oid, index)))
        .collect();

    // Pre-filter each item's parents to those present in the input, ordered
    // by original input position.
    let parents: Vec<Vec<usize>> = items
        .iter()
        .map(|item| {
            let mut found: Vec<usize> = item
                .identity()
                .and_then(|oid| deps.get(&oid))
                .map(|parents| {
                    parents
                        .iter()
                        .filter_map(|p| position.get(p).copied())
                        .collect()
                })
                .unwrap_or_default();
            found.sort_unstable();
            found.dedup();
            found
        })
        .collect();

    let mut marks = vec![Mark::Unvisited; items.len()];
    let mut order = Vec::with_capacity(items.len());

    for start in 0..items.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::InProgress;
        // Iterative depth-first walk; each frame remembers how many parents
        // it has already descended into.
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            if frame.1 < parents[node].len() {
                let parent = parents[node][frame.1];
                frame.1 += 1;
                match marks[parent] {
                    Mark::Unvisited => {
                        marks[parent] = Mark::InProgress;
                        stack.push((parent, 0));
                    }
                    Mark::InProgress => {
                        return Err(Error::CycleDetected {
                            object: items[parent].label(),
                        });
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                order.push(node);
                stack.pop();
            }
        }
    }

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Item {
        id: u32,
        name: &'static str,
    }

    impl Item {
        fn new(id: u32, name: &'static str) -> Self {
            Self { id, name }
        }
    }

    impl Identify for Item {
        fn identity(&self) -> Option<Oid> {
            Some(Oid(self.id))
        }

        fn label(&self) -> String {
            self.name.to_string()
        }
    }

    fn deps(edges: &[(u32, &[u32])]) -> HashMap<Oid, BTreeSet<Oid>> {
        edges
            .iter()
            .map(|(child, parents)| {
                (Oid(*child), parents.iter().map(|p| Oid(*p)).collect())
            })
            .collect()
    }

    fn names(items: &[Item]) -> Vec<&'static str> {
        items.iter().map(|i| i.name).collect()
    }

    #[test]
    fn test_parent_precedes_child() {
        let items = vec![Item::new(3, "c"), Item::new(1, "a"), Item::new(2, "b")];
        let deps = deps(&[(3, &[2]), (2, &[1])]);

        let resolved = resolve(items, &deps).unwrap();
        assert_eq!(names(&resolved), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_no_dependencies_is_identity() {
        let items = vec![Item::new(2, "b"), Item::new(1, "a")];
        let resolved = resolve(items, &HashMap::new()).unwrap();
        assert_eq!(names(&resolved), vec!["b", "a"]);
    }

    #[test]
    fn test_missing_parent_ignored() {
        let items = vec![Item::new(1, "a"), Item::new(2, "b")];
        let deps = deps(&[(1, &[99])]);

        let resolved = resolve(items, &deps).unwrap();
        assert_eq!(names(&resolved), vec!["a", "b"]);
    }

    #[test]
    fn test_parents_visited_in_input_order() {
        // c depends on both a and b; a appears after b in the input, so b
        // is visited first.
        let items = vec![Item::new(3, "c"), Item::new(2, "b"), Item::new(1, "a")];
        let deps = deps(&[(3, &[1, 2])]);

        let resolved = resolve(items, &deps).unwrap();
        assert_eq!(names(&resolved), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_cycle_detected() {
        let items = vec![Item::new(1, "a"), Item::new(2, "b")];
        let deps = deps(&[(1, &[2]), (2, &[1])]);

        let err = resolve(items, &deps).unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let items = vec![Item::new(1, "a")];
        let deps = deps(&[(1, &[1])]);
        assert!(matches!(
            resolve(items, &deps),
            Err(Error::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_every_item_appears_once() {
        let items = vec![
            Item::new(1, "a"),
            Item::new(2, "b"),
            Item::new(3, "c"),
            Item::new(4, "d"),
        ];
        let deps = deps(&[(4, &[2]), (3, &[2]), (2, &[1])]);

        let resolved = resolve(items, &deps).unwrap();
        assert_eq!(resolved.len(), 4);
        assert_eq!(names(&resolved), vec!["a", "b", "c", "d"]);
    }
}
