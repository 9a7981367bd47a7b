//! # Docker SDK Strategy Walker
//!
//! File: sdk/src/wait/walk.rs
//!
//! ## Overview
//!
//! Depth-first, pre-order traversal of a strategy tree. The visitor decides per
//! node whether to keep going, stop, or remove the node in place. A removed node
//! is not descended into. Children of `All` are visited after their parent.
//!
//! ## Examples
//!
//! ```rust
//! use docker_sdk::wait::{self, walk, VisitAction, WaitStrategy};
//!
//! let mut root = Some(WaitStrategy::from(wait::for_all(vec![
//!     wait::for_file("/ready").into(),
//!     wait::for_http("/").into(),
//! ])));
//!
//! walk(&mut root, |s| match s {
//!     WaitStrategy::File(_) => VisitAction::Remove,
//!     _ => VisitAction::Continue,
//! })
//! .unwrap();
//!
//! let mut kinds = Vec::new();
//! walk(&mut root, |s| {
//!     kinds.push(s.kind());
//!     VisitAction::Continue
//! })
//! .unwrap();
//! assert_eq!(kinds, ["all", "http"]);
//! ```
//!
use super::WaitStrategy;
use crate::core::error::Result;
use anyhow::bail;

/// What the walker does after visiting a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
    Continue,
    /// End the traversal.
    Stop,
    /// Remove the node and keep going.
    Remove,
    /// Remove the node, then end the traversal.
    RemoveAndStop,
}

impl VisitAction {
    fn removes(self) -> bool {
        matches!(self, Self::Remove | Self::RemoveAndStop)
    }

    fn stops(self) -> bool {
        matches!(self, Self::Stop | Self::RemoveAndStop)
    }
}

/// Walks `root`, applying `visit` to every node.
///
/// # Errors
///
/// Fails without visiting anything when `root` is `None`.
pub fn walk<F>(root: &mut Option<WaitStrategy>, mut visit: F) -> Result<()>
where
    F: FnMut(&WaitStrategy) -> VisitAction,
{
    let Some(node) = root.as_mut() else {
        bail!("wait strategy is nil");
    };
    let action = visit(node);
    if action.removes() {
        *root = None;
        return Ok(());
    }
    if action.stops() {
        return Ok(());
    }
    if let WaitStrategy::All(all) = node {
        walk_children(&mut all.strategies, &mut visit);
    }
    Ok(())
}

/// Returns true when the traversal was stopped.
fn walk_children<F>(children: &mut Vec<WaitStrategy>, visit: &mut F) -> bool
where
    F: FnMut(&WaitStrategy) -> VisitAction,
{
    let mut i = 0;
    while i < children.len() {
        let action = visit(&children[i]);
        if action.removes() {
            children.remove(i);
        }
        if action.stops() {
            return true;
        }
        if action.removes() {
            continue;
        }
        if let WaitStrategy::All(all) = &mut children[i] {
            if walk_children(&mut all.strategies, visit) {
                return true;
            }
        }
        i += 1;
    }
    false
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::super::{for_all, for_file, for_http, for_log};
    use super::*;

    fn count(root: &mut Option<WaitStrategy>) -> usize {
        let mut n = 0;
        let _ = walk(root, |_| {
            n += 1;
            VisitAction::Continue
        });
        n
    }

    fn tree() -> Option<WaitStrategy> {
        Some(
            for_all(vec![
                for_file("/a").into(),
                for_http("/").into(),
                for_all(vec![for_file("/b").into()]).into(),
            ])
            .into(),
        )
    }

    #[test]
    fn test_remove_file_strategies() {
        let mut root = tree();
        let mut visited = 0;
        let mut removed = 0;
        walk(&mut root, |s| {
            visited += 1;
            if matches!(s, WaitStrategy::File(_)) {
                removed += 1;
                VisitAction::Remove
            } else {
                VisitAction::Continue
            }
        })
        .unwrap();
        assert_eq!(visited, 5);
        assert_eq!(removed, 2);
        assert_eq!(count(&mut root), 3);
    }

    #[test]
    fn test_remove_everything_leaves_nothing() {
        let mut root = tree();
        walk(&mut root, |_| VisitAction::Remove).unwrap();
        assert!(root.is_none());
        assert!(walk(&mut root, |_| VisitAction::Continue).is_err());
        assert_eq!(count(&mut root), 0);
    }

    #[test]
    fn test_bare_and_wrapped_visit_counts() {
        let mut bare = Some(WaitStrategy::from(for_log("x")));
        assert_eq!(count(&mut bare), 1);
        let mut wrapped = Some(WaitStrategy::from(for_all(vec![for_log("x").into()])));
        assert_eq!(count(&mut wrapped), 2);
    }

    #[test]
    fn test_stop_and_remove_and_stop() {
        let mut root = tree();
        let mut seen = Vec::new();
        walk(&mut root, |s| {
            seen.push(s.kind());
            if matches!(s, WaitStrategy::Http(_)) {
                VisitAction::Stop
            } else {
                VisitAction::Continue
            }
        })
        .unwrap();
        assert_eq!(seen, ["all", "file", "http"]);

        walk(&mut root, |s| {
            if matches!(s, WaitStrategy::File(_)) {
                VisitAction::RemoveAndStop
            } else {
                VisitAction::Continue
            }
        })
        .unwrap();
        // Only the first file went; the nested one survives.
        assert_eq!(count(&mut root), 4);
    }
}
