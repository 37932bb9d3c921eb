//! Query recursion tree.
//!
//! Nodes live in an arena indexed by id; parents hold child-id lists, so
//! there are no ownership cycles and the whole tree drops with the session.
//! Status transitions enforce the structural invariants: a decomposed node
//! has at least one child, and a node with children is only answered after
//! every child is terminal (answered or failed). The depth bound is the
//! controller's to enforce; the arena does not know `max_depth`.

use serde::Serialize;

use crate::error::{AppError, AppResult};

/// Arena index of a query node, unique within a session.
pub type NodeId = usize;

/// Lifecycle state of a query node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Created, not yet resolved.
    Pending,
    /// Split into sub-queries.
    Decomposed,
    /// Resolved with an answer.
    Answered,
    /// Resolution failed.
    Failed,
}

/// One node in the recursion tree.
#[derive(Debug, Clone, Serialize)]
pub struct QueryNode {
    /// Arena index.
    pub id: NodeId,
    /// The question content.
    pub text: String,
    /// Distance from the root (root is 0).
    pub depth: u32,
    /// Lifecycle state.
    pub status: NodeStatus,
    /// Ordered sub-query ids; empty unless decomposed.
    pub children: Vec<NodeId>,
    /// Set only when status is `Answered`.
    pub answer: Option<String>,
}

impl QueryNode {
    /// Whether the node reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, NodeStatus::Answered | NodeStatus::Failed)
    }
}

/// Arena of query nodes for one resolution.
#[derive(Debug, Default)]
pub struct QueryTree {
    nodes: Vec<QueryNode>,
}

impl QueryTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a pending node and return its id.
    pub fn push(&mut self, text: impl Into<String>, depth: u32) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(QueryNode {
            id,
            text: text.into(),
            depth,
            status: NodeStatus::Pending,
            children: Vec::new(),
            answer: None,
        });
        id
    }

    /// Borrow a node. `id` must have come from [`QueryTree::push`].
    pub fn node(&self, id: NodeId) -> &QueryNode {
        &self.nodes[id]
    }

    /// Mark a node decomposed into the given ordered children.
    pub fn mark_decomposed(&mut self, id: NodeId, children: &[NodeId]) -> AppResult<()> {
        if children.is_empty() {
            return Err(AppError::Internal {
                message: format!("node {} decomposed with no children", id),
            });
        }
        let node = &mut self.nodes[id];
        node.status = NodeStatus::Decomposed;
        node.children = children.to_vec();
        Ok(())
    }

    /// Mark a node answered. Fails if any child is still in flight.
    pub fn mark_answered(&mut self, id: NodeId, answer: impl Into<String>) -> AppResult<()> {
        let unfinished = self.nodes[id]
            .children
            .iter()
            .filter(|&&child| !self.nodes[child].is_terminal())
            .count();
        if unfinished > 0 {
            return Err(AppError::Internal {
                message: format!(
                    "node {} answered with {} children still unresolved",
                    id, unfinished
                ),
            });
        }
        let node = &mut self.nodes[id];
        node.status = NodeStatus::Answered;
        node.answer = Some(answer.into());
        Ok(())
    }

    /// Mark a node failed.
    pub fn mark_failed(&mut self, id: NodeId) {
        self.nodes[id].status = NodeStatus::Failed;
    }

    /// Total nodes allocated.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_assigns_sequential_ids() {
        let mut tree = QueryTree::new();
        let root = tree.push("root", 0);
        let child = tree.push("child", 1);

        assert_eq!(root, 0);
        assert_eq!(child, 1);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.node(root).status, NodeStatus::Pending);
        assert_eq!(tree.node(child).depth, 1);
    }

    #[test]
    fn test_decompose_requires_children() {
        let mut tree = QueryTree::new();
        let root = tree.push("root", 0);

        assert!(tree.mark_decomposed(root, &[]).is_err());

        let a = tree.push("a", 1);
        let b = tree.push("b", 1);
        tree.mark_decomposed(root, &[a, b]).unwrap();
        assert_eq!(tree.node(root).status, NodeStatus::Decomposed);
        assert_eq!(tree.node(root).children, vec![a, b]);
    }

    #[test]
    fn test_answer_blocked_until_children_terminal() {
        let mut tree = QueryTree::new();
        let root = tree.push("root", 0);
        let a = tree.push("a", 1);
        let b = tree.push("b", 1);
        tree.mark_decomposed(root, &[a, b]).unwrap();

        assert!(tree.mark_answered(root, "merged").is_err());

        tree.mark_answered(a, "answer a").unwrap();
        assert!(tree.mark_answered(root, "merged").is_err());

        // A failed child is terminal too; the parent may then answer.
        tree.mark_failed(b);
        tree.mark_answered(root, "merged").unwrap();
        assert_eq!(tree.node(root).answer.as_deref(), Some("merged"));
    }

    #[test]
    fn test_leaf_answers_directly() {
        let mut tree = QueryTree::new();
        let leaf = tree.push("leaf", 2);
        tree.mark_answered(leaf, "done").unwrap();
        assert_eq!(tree.node(leaf).status, NodeStatus::Answered);
    }
}
