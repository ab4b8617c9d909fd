//! Tree assembler
//!
//! Turns a flat list of parent-referencing rows (departments, permissions) into a
//! forest. Works over an id-indexed arena with an explicit stack, so hierarchy
//! depth never touches the call stack and parent cycles are broken instead of
//! looping.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A row that references its parent by id.
pub trait TreeItem {
    fn node_id(&self) -> i64;
    fn parent_id(&self) -> Option<i64>;
}

/// A node plus its ordered children. The persisted entity stays free of any
/// children collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeNode<T> {
    #[serde(flatten)]
    pub value: T,
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    pub fn leaf(value: T) -> Self {
        Self {
            value,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including itself
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl<T: TreeItem> TreeNode<T> {
    /// Depth-first search for a node id within this subtree
    pub fn find(&self, id: i64) -> Option<&TreeNode<T>> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.value.node_id() == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

/// Pre-order ids of a forest, children in stored order
pub fn flatten<T: TreeItem>(forest: &[TreeNode<T>]) -> Vec<i64> {
    let mut ids = Vec::new();
    let mut stack: Vec<&TreeNode<T>> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        ids.push(node.value.node_id());
        stack.extend(node.children.iter().rev());
    }
    ids
}

/// Why a node ended up as a root although it declares a parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeDiagnostic {
    /// The declared parent is not part of the input set
    DanglingParent { id: i64, parent_id: i64 },
    /// The node's ancestor chain loops back onto itself
    Cycle { id: i64 },
}

/// Result of [`assemble`]: the forest plus what had to be repaired to build it.
#[derive(Clone, Debug)]
pub struct Forest<T> {
    pub roots: Vec<TreeNode<T>>,
    pub diagnostics: Vec<TreeDiagnostic>,
}

/// Build a forest from rows implementing [`TreeItem`].
pub fn build_forest<T: TreeItem>(nodes: Vec<T>) -> Vec<TreeNode<T>> {
    assemble(nodes).roots
}

/// Build a forest using key closures instead of the [`TreeItem`] trait.
pub fn build_forest_by<T, I, P>(nodes: Vec<T>, id_of: I, parent_of: P) -> Vec<TreeNode<T>>
where
    I: Fn(&T) -> i64,
    P: Fn(&T) -> Option<i64>,
{
    assemble_by(nodes, id_of, parent_of).roots
}

/// Build a forest and report dangling parents and broken cycles.
pub fn assemble<T: TreeItem>(nodes: Vec<T>) -> Forest<T> {
    assemble_by(nodes, |n| n.node_id(), |n| n.parent_id())
}

pub fn assemble_by<T, I, P>(nodes: Vec<T>, id_of: I, parent_of: P) -> Forest<T>
where
    I: Fn(&T) -> i64,
    P: Fn(&T) -> Option<i64>,
{
    let count = nodes.len();
    let mut diagnostics = Vec::new();

    // First occurrence wins when ids repeat
    let mut index: HashMap<i64, usize> = HashMap::with_capacity(count);
    for (pos, node) in nodes.iter().enumerate() {
        index.entry(id_of(node)).or_insert(pos);
    }

    let mut parent_of_pos: Vec<Option<usize>> = Vec::with_capacity(count);
    for node in &nodes {
        let id = id_of(node);
        let parent = match parent_of(node) {
            None => None,
            Some(parent_id) if parent_id == id => {
                diagnostics.push(TreeDiagnostic::Cycle { id });
                None
            }
            Some(parent_id) => match index.get(&parent_id) {
                Some(&pos) => Some(pos),
                None => {
                    diagnostics.push(TreeDiagnostic::DanglingParent { id, parent_id });
                    None
                }
            },
        };
        parent_of_pos.push(parent);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut roots: Vec<usize> = Vec::new();
    for (pos, parent) in parent_of_pos.iter().enumerate() {
        match parent {
            Some(parent) => children[*parent].push(pos),
            None => roots.push(pos),
        }
    }

    // Pre-order discovery from the natural roots
    let mut visited = vec![false; count];
    let mut order: Vec<usize> = Vec::with_capacity(count);
    for &root in &roots {
        discover(root, &children, &mut visited, &mut order);
    }

    // Whatever is left sits on or below a parent cycle. Promote the earliest
    // cycle member to a root and cut only the edge that closed the loop; nodes
    // hanging off the cycle keep their parents.
    for pos in 0..count {
        if visited[pos] {
            continue;
        }
        let entry = cycle_entry(pos, &parent_of_pos);
        diagnostics.push(TreeDiagnostic::Cycle { id: id_of(&nodes[entry]) });
        if let Some(parent) = parent_of_pos[entry] {
            children[parent].retain(|&c| c != entry);
        }
        roots.push(entry);
        discover(entry, &children, &mut visited, &mut order);
    }

    // Children are discovered after their parent, so building in reverse
    // discovery order always finds the child subtrees ready.
    let mut values: Vec<Option<T>> = nodes.into_iter().map(Some).collect();
    let mut built: Vec<Option<TreeNode<T>>> = (0..count).map(|_| None).collect();
    for &pos in order.iter().rev() {
        let kids = children[pos]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        if let Some(value) = values[pos].take() {
            built[pos] = Some(TreeNode {
                value,
                children: kids,
            });
        }
    }

    let roots = roots.into_iter().filter_map(|pos| built[pos].take()).collect();

    Forest { roots, diagnostics }
}

/// Follow parents from `start` until a position repeats, then return the
/// lowest input position on that loop.
fn cycle_entry(start: usize, parent_of_pos: &[Option<usize>]) -> usize {
    let mut seen = HashSet::new();
    let mut pos = start;
    while seen.insert(pos) {
        match parent_of_pos[pos] {
            Some(parent) => pos = parent,
            None => return pos,
        }
    }

    let mut first = pos;
    let mut next = parent_of_pos[pos];
    while let Some(member) = next {
        if member == pos {
            break;
        }
        first = first.min(member);
        next = parent_of_pos[member];
    }
    first
}

fn discover(start: usize, children: &[Vec<usize>], visited: &mut [bool], order: &mut Vec<usize>) {
    if visited[start] {
        return;
    }
    let mut stack = vec![start];
    while let Some(pos) = stack.pop() {
        if visited[pos] {
            continue;
        }
        visited[pos] = true;
        order.push(pos);
        for &child in children[pos].iter().rev() {
            if !visited[child] {
                stack.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize)]
    struct Node {
        id: i64,
        parent: Option<i64>,
    }

    impl TreeItem for Node {
        fn node_id(&self) -> i64 {
            self.id
        }

        fn parent_id(&self) -> Option<i64> {
            self.parent
        }
    }

    fn n(id: i64, parent: Option<i64>) -> Node {
        Node { id, parent }
    }

    fn child_ids(node: &TreeNode<Node>) -> Vec<i64> {
        node.children.iter().map(|c| c.value.id).collect()
    }

    #[test]
    fn builds_nested_forest_in_input_order() {
        let forest = build_forest(vec![
            n(1, None),
            n(2, Some(1)),
            n(3, Some(1)),
            n(4, Some(2)),
            n(5, None),
        ]);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].value.id, 1);
        assert_eq!(child_ids(&forest[0]), vec![2, 3]);
        assert_eq!(child_ids(&forest[0].children[0]), vec![4]);
        assert!(forest[1].is_leaf());
        assert_eq!(flatten(&forest), vec![1, 2, 4, 3, 5]);
    }

    #[test]
    fn children_may_precede_their_parent() {
        let forest = build_forest(vec![n(4, Some(2)), n(3, Some(1)), n(2, Some(1)), n(1, None)]);

        assert_eq!(forest.len(), 1);
        assert_eq!(child_ids(&forest[0]), vec![3, 2]);
        assert_eq!(forest[0].size(), 4);
        assert_eq!(forest[0].find(4).map(|t| t.value.id), Some(4));
    }

    #[test]
    fn orphan_becomes_root_with_diagnostic() {
        let result = assemble(vec![n(1, None), n(7, Some(99)), n(8, Some(7))]);

        assert_eq!(result.roots.len(), 2);
        assert_eq!(result.roots[1].value.id, 7);
        assert_eq!(child_ids(&result.roots[1]), vec![8]);
        assert_eq!(
            result.diagnostics,
            vec![TreeDiagnostic::DanglingParent { id: 7, parent_id: 99 }]
        );
    }

    #[test]
    fn cycles_are_broken_and_every_node_kept() {
        let result = assemble(vec![
            n(1, None),
            n(2, Some(3)),
            n(3, Some(2)),
            n(4, Some(4)),
            n(5, Some(3)),
        ]);

        let mut ids = flatten(&result.roots);
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        assert!(result.diagnostics.contains(&TreeDiagnostic::Cycle { id: 4 }));
        assert!(result.diagnostics.contains(&TreeDiagnostic::Cycle { id: 2 }));

        let promoted = result.roots.iter().find(|r| r.value.id == 2).unwrap();
        assert_eq!(child_ids(promoted), vec![3]);
        assert_eq!(child_ids(&promoted.children[0]), vec![5]);
    }

    #[test]
    fn node_below_cycle_keeps_its_parent() {
        // 5 hangs off the 2 <-> 3 loop and comes first in the input
        let result = assemble(vec![n(5, Some(3)), n(2, Some(3)), n(3, Some(2))]);

        assert_eq!(result.diagnostics, vec![TreeDiagnostic::Cycle { id: 2 }]);
        assert_eq!(result.roots.len(), 1);
        let root = &result.roots[0];
        assert_eq!(root.value.id, 2);
        assert_eq!(child_ids(root), vec![3]);
        assert_eq!(child_ids(&root.children[0]), vec![5]);
    }

    #[test]
    fn every_parent_matches_declared_parent() {
        let input: Vec<Node> = (1..=50)
            .map(|id| n(id, if id == 1 { None } else { Some(id / 2) }))
            .collect();
        let forest = build_forest(input.clone());

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].size(), 50);

        let mut stack: Vec<&TreeNode<Node>> = forest.iter().collect();
        while let Some(node) = stack.pop() {
            for child in &node.children {
                assert_eq!(child.value.parent, Some(node.value.id));
                stack.push(child);
            }
        }
    }

    #[test]
    fn deep_chain_builds_iteratively() {
        let input: Vec<Node> = (1..=2_000)
            .map(|id| n(id, if id == 1 { None } else { Some(id - 1) }))
            .collect();
        let forest = build_forest(input);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].size(), 2_000);
        assert_eq!(flatten(&forest).last(), Some(&2_000));
    }

    #[test]
    fn key_closures_work_without_trait() {
        let rows = vec![(10, None), (11, Some(10)), (12, Some(10))];
        let forest = build_forest_by(rows, |r: &(i64, Option<i64>)| r.0, |r| r.1);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children.len(), 2);
        assert_eq!(forest[0].children[1].value.0, 12);
    }

    #[test]
    fn serializes_flattened_with_children() {
        let forest = build_forest(vec![n(1, None), n(2, Some(1))]);
        let json = serde_json::to_value(&forest).unwrap();

        assert_eq!(json[0]["id"], 1);
        assert_eq!(json[0]["children"][0]["id"], 2);
        assert_eq!(json[0]["children"][0]["children"], serde_json::json!([]));
    }
}
