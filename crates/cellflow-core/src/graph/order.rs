//! Cycle detection and execution ordering over registered prerequisites.

use rustc_hash::FxHashSet;

use crate::state::Registry;

use super::types::{Cell, CellId, MissingPrerequisite};

/// Execution order resolved from one or more root cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Cells in dependency order: every prerequisite precedes its dependents.
    pub order: Vec<CellId>,
    /// Prerequisite references that point at unregistered cells.
    pub missing: Vec<MissingPrerequisite>,
}

/// Find the first prerequisite cycle reachable from `roots`.
///
/// Returns the cycle as a path that starts and ends with the same cell,
/// e.g. `[a, b, c, a]`. Unregistered prerequisites are ignored.
pub fn find_cycle<'a>(
    registry: &Registry,
    roots: impl IntoIterator<Item = &'a CellId>,
) -> Option<Vec<CellId>> {
    let mut visited = FxHashSet::default();
    roots
        .into_iter()
        .find_map(|root| cycle_from(registry, root, &mut visited))
}

/// Cell on the depth-first stack, with the index of the next prerequisite to
/// descend into.
struct Frame<'r> {
    id: &'r CellId,
    prerequisites: &'r [CellId],
    next: usize,
}

impl<'r> Frame<'r> {
    fn new(cell: &'r Cell) -> Self {
        Self {
            id: &cell.id,
            prerequisites: &cell.prerequisites,
            next: 0,
        }
    }
}

fn cycle_from<'r>(
    registry: &'r Registry,
    root: &CellId,
    visited: &mut FxHashSet<&'r CellId>,
) -> Option<Vec<CellId>> {
    let cell = registry.get(root.as_str())?;
    if visited.contains(&cell.id) {
        return None;
    }

    let mut on_path: FxHashSet<&CellId> = FxHashSet::default();
    on_path.insert(&cell.id);
    let mut stack = vec![Frame::new(cell)];

    while let Some(frame) = stack.last_mut() {
        let prerequisites = frame.prerequisites;
        let Some(next) = prerequisites.get(frame.next) else {
            let id = frame.id;
            stack.pop();
            on_path.remove(id);
            visited.insert(id);
            continue;
        };
        frame.next += 1;

        if on_path.contains(next) {
            let start = stack.iter().position(|f| f.id == next).unwrap_or(0);
            let mut cycle: Vec<CellId> = stack[start..].iter().map(|f| f.id.clone()).collect();
            cycle.push(next.clone());
            return Some(cycle);
        }
        if visited.contains(next) {
            continue;
        }
        if let Some(cell) = registry.get(next.as_str()) {
            on_path.insert(&cell.id);
            stack.push(Frame::new(cell));
        }
    }

    None
}

/// Resolve the execution order for `roots` and all their prerequisites.
///
/// Depth-first post-order: each prerequisite is emitted (in listed order)
/// before the cell that needs it, and a cell shared by several dependents is
/// emitted once, at its first completion. Roots are seeded in the given
/// order, skipping any already emitted.
///
/// The registry must be acyclic along the traversed edges; check with
/// [`find_cycle`] first.
pub fn resolve_order<'a>(
    registry: &Registry,
    roots: impl IntoIterator<Item = &'a CellId>,
) -> Resolution {
    let mut visited: FxHashSet<&CellId> = FxHashSet::default();
    let mut resolution = Resolution::default();
    let mut stack: Vec<Frame<'_>> = Vec::new();

    for root in roots {
        let Some(cell) = registry.get(root.as_str()) else {
            tracing::warn!("Requested cell '{}' is not registered", root);
            resolution.missing.push(MissingPrerequisite {
                dependent: None,
                missing: root.clone(),
            });
            continue;
        };
        if !visited.insert(&cell.id) {
            continue;
        }
        stack.push(Frame::new(cell));

        while let Some(frame) = stack.last_mut() {
            let prerequisites = frame.prerequisites;
            let Some(next) = prerequisites.get(frame.next) else {
                let id = frame.id;
                stack.pop();
                resolution.order.push(id.clone());
                continue;
            };
            frame.next += 1;

            match registry.get(next.as_str()) {
                Some(cell) => {
                    if visited.insert(&cell.id) {
                        stack.push(Frame::new(cell));
                    }
                }
                None => {
                    tracing::warn!(
                        "Cell '{}' lists unknown prerequisite '{}', skipping",
                        frame.id,
                        next
                    );
                    resolution.missing.push(MissingPrerequisite {
                        dependent: Some(frame.id.clone()),
                        missing: next.clone(),
                    });
                }
            }
        }
    }

    resolution
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::Error;
    use crate::execute::{CellOutcome, CellRunner};

    fn make_registry(cells: &[(&str, &[&str])]) -> Registry {
        let runner: Arc<dyn CellRunner> =
            Arc::new(|| async { Ok::<_, Error>(CellOutcome::Success) });
        let mut registry = Registry::new();
        for &(id, prerequisites) in cells {
            registry.insert(Cell::new(
                id.into(),
                prerequisites.iter().map(|&p| CellId::from(p)).collect(),
                runner.clone(),
            ));
        }
        registry
    }

    /// `c0 <- c1 <- ... <- c{len-1}`, optionally with `c0` depending on the last cell.
    fn chain_registry(len: usize, closed: bool) -> Registry {
        let runner: Arc<dyn CellRunner> =
            Arc::new(|| async { Ok::<_, Error>(CellOutcome::Success) });
        let mut registry = Registry::new();
        for i in 0..len {
            let prerequisite = match i {
                0 if closed => vec![CellId::new(format!("c{}", len - 1))],
                0 => Vec::new(),
                _ => vec![CellId::new(format!("c{}", i - 1))],
            };
            registry.insert(Cell::new(
                CellId::new(format!("c{i}")),
                prerequisite,
                runner.clone(),
            ));
        }
        registry
    }

    fn ids(order: &[CellId]) -> Vec<&str> {
        order.iter().map(CellId::as_str).collect()
    }

    #[test]
    fn test_linear_chain() {
        let registry = make_registry(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);
        let target = CellId::from("c");

        assert!(find_cycle(&registry, [&target]).is_none());
        let resolution = resolve_order(&registry, [&target]);
        assert_eq!(ids(&resolution.order), vec!["a", "b", "c"]);
        assert!(resolution.missing.is_empty());
    }

    #[test]
    fn test_diamond_emits_shared_prerequisite_once() {
        let registry = make_registry(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("d", &["b", "c"]),
        ]);

        let resolution = resolve_order(&registry, [&CellId::from("d")]);
        assert_eq!(ids(&resolution.order), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_sibling_order_follows_listing() {
        let registry = make_registry(&[("x", &[]), ("y", &[]), ("z", &["y", "x"])]);

        let resolution = resolve_order(&registry, [&CellId::from("z")]);
        assert_eq!(ids(&resolution.order), vec!["y", "x", "z"]);
    }

    #[test]
    fn test_unrelated_cells_are_not_included() {
        let registry = make_registry(&[("a", &[]), ("b", &["a"]), ("other", &[])]);

        let resolution = resolve_order(&registry, [&CellId::from("b")]);
        assert_eq!(ids(&resolution.order), vec!["a", "b"]);
    }

    #[test]
    fn test_cycle_path_starts_and_ends_with_repeated_cell() {
        let registry = make_registry(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);

        let cycle = find_cycle(&registry, [&CellId::from("a")]).unwrap();
        assert_eq!(ids(&cycle), vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_cycle_not_involving_root() {
        let registry = make_registry(&[("root", &["a"]), ("a", &["b"]), ("b", &["a"])]);

        let cycle = find_cycle(&registry, [&CellId::from("root")]).unwrap();
        assert_eq!(ids(&cycle), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_self_cycle() {
        let registry = make_registry(&[("a", &["a"])]);

        let cycle = find_cycle(&registry, [&CellId::from("a")]).unwrap();
        assert_eq!(ids(&cycle), vec!["a", "a"]);
    }

    #[test]
    fn test_shared_prerequisite_is_not_a_cycle() {
        let registry = make_registry(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["a", "b"]),
        ]);

        assert!(find_cycle(&registry, [&CellId::from("c")]).is_none());
    }

    #[test]
    fn test_dangling_prerequisite_is_reported() {
        let registry = make_registry(&[("a", &[]), ("b", &["a", "gone"])]);

        let resolution = resolve_order(&registry, [&CellId::from("b")]);
        assert_eq!(ids(&resolution.order), vec!["a", "b"]);
        assert_eq!(
            resolution.missing,
            vec![MissingPrerequisite {
                dependent: Some("b".into()),
                missing: "gone".into(),
            }]
        );
    }

    #[test]
    fn test_unknown_root_is_reported() {
        let registry = make_registry(&[("a", &[])]);

        let resolution = resolve_order(&registry, [&CellId::from("ghost")]);
        assert!(resolution.order.is_empty());
        assert_eq!(resolution.missing[0].dependent, None);
        assert_eq!(resolution.missing[0].missing, "ghost");
    }

    #[test]
    fn test_multiple_roots_skip_already_emitted() {
        let registry = make_registry(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &[]),
            ("d", &["c", "b"]),
        ]);
        let roots: Vec<CellId> = registry.ids().cloned().collect();

        let resolution = resolve_order(&registry, &roots);
        assert_eq!(ids(&resolution.order), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_long_chain_does_not_exhaust_stack() {
        let registry = chain_registry(100_000, false);
        let target = CellId::from("c99999");

        assert!(find_cycle(&registry, [&target]).is_none());
        let resolution = resolve_order(&registry, [&target]);
        assert_eq!(resolution.order.len(), 100_000);
        assert_eq!(resolution.order[0], "c0");
        assert_eq!(resolution.order[99_999], "c99999");
    }

    #[test]
    fn test_long_cycle_reports_full_path() {
        let registry = chain_registry(100_000, true);

        let cycle = find_cycle(&registry, [&CellId::from("c0")]).unwrap();
        assert_eq!(cycle.len(), 100_001);
        assert_eq!(cycle[0], "c0");
        assert_eq!(cycle[1], "c99999");
        assert_eq!(cycle[100_000], "c0");
    }
}
