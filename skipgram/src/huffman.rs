//! Huffman coding tree over token frequencies.
//!
//! Frequent tokens get short codes. Each leaf's `path` lists the internal
//! nodes visited from the root, and its `code` lists the branch taken at each
//! of them; hierarchical softmax scores a token by walking exactly those
//! nodes.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::{Error, Result};
use crate::vocab::Vocabulary;

/// One node of the tree. Leaves have ids `0..V`, internal nodes `V..2V-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanNode {
    pub id: usize,
    /// Sum of the counts of all leaves under this node.
    pub frequency: u64,
    pub parent: Option<usize>,
    /// Meaningless for the root.
    pub is_left_child: bool,
    pub left: Option<usize>,
    pub right: Option<usize>,
    /// Branch bits from the root down to this node: 0 = left, 1 = right.
    pub code: Vec<u8>,
    /// Internal node ids from the root down to this node's parent.
    pub path: Vec<usize>,
}

impl HuffmanNode {
    fn new(id: usize, frequency: u64) -> Self {
        HuffmanNode {
            id,
            frequency,
            parent: None,
            is_left_child: false,
            left: None,
            right: None,
            code: vec![],
            path: vec![],
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none()
    }
}

/// Arena of `2V - 1` nodes indexed by id. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    nodes: Vec<HuffmanNode>,
    num_leaves: usize,
}

impl HuffmanTree {
    pub fn build(vocab: &Vocabulary) -> Result<Self> {
        Self::from_counts(vocab.counts())
    }

    /// Create binary Huffman tree using the word counts.
    ///
    /// Ties on frequency are broken by id, so merge order (and therefore
    /// every code) is a pure function of `counts`.
    pub fn from_counts(counts: &[u64]) -> Result<Self> {
        let vocab_size = counts.len();
        match vocab_size {
            0 => return Err(Error::EmptyVocabulary),
            1 => return Err(Error::DegenerateTree { size: 1 }),
            _ => {}
        }

        let mut nodes: Vec<HuffmanNode> = Vec::with_capacity(vocab_size * 2 - 1);
        let mut heap = BinaryHeap::with_capacity(vocab_size);
        for (id, &cn) in counts.iter().enumerate() {
            nodes.push(HuffmanNode::new(id, cn));
            heap.push(Reverse((cn, id)));
        }

        while let (Some(Reverse((f1, min1))), Some(Reverse((f2, min2)))) = (heap.pop(), heap.pop())
        {
            let id = nodes.len();
            let mut node = HuffmanNode::new(id, f1 + f2);
            node.left = Some(min1);
            node.right = Some(min2);
            nodes[min1].parent = Some(id);
            nodes[min1].is_left_child = true;
            nodes[min2].parent = Some(id);
            nodes[min2].is_left_child = false;
            nodes.push(node);
            heap.push(Reverse((f1 + f2, id)));
        }
        debug_assert_eq!(nodes.len(), vocab_size * 2 - 1);

        let mut tree = HuffmanTree {
            nodes,
            num_leaves: vocab_size,
        };
        tree.assign_codes();
        Ok(tree)
    }

    // Root-down walk; every child extends its parent's code and path.
    fn assign_codes(&mut self) {
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let (left, right) = (self.nodes[id].left, self.nodes[id].right);
            for (child, bit) in [(left, 0u8), (right, 1u8)] {
                let Some(child) = child else { continue };
                let mut code = self.nodes[id].code.clone();
                code.push(bit);
                let mut path = self.nodes[id].path.clone();
                path.push(id);
                self.nodes[child].code = code;
                self.nodes[child].path = path;
                stack.push(child);
            }
        }
    }

    /// Number of leaves, i.e. the vocabulary size V.
    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    /// Total number of nodes, `2V - 1`.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_internal(&self) -> usize {
        self.nodes.len() - self.num_leaves
    }

    /// The last node created is the root.
    pub fn root(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn node(&self, id: usize) -> &HuffmanNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[HuffmanNode] {
        &self.nodes
    }

    pub fn code(&self, id: usize) -> &[u8] {
        &self.nodes[id].code
    }

    pub fn path(&self, id: usize) -> &[usize] {
        &self.nodes[id].path
    }

    /// Number of edges between the root and `id`, counted by following
    /// parent links.
    pub fn depth(&self, id: usize) -> usize {
        let mut depth = 0;
        let mut b = id;
        while let Some(p) = self.nodes[b].parent {
            depth += 1;
            b = p;
        }
        depth
    }

    /// `Σ count(leaf) * code_len(leaf)`, the quantity Huffman minimizes.
    pub fn weighted_path_length(&self) -> u64 {
        self.nodes[..self.num_leaves]
            .iter()
            .map(|n| n.frequency * n.code.len() as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_token_is_degenerate() {
        assert!(matches!(
            HuffmanTree::from_counts(&[7]),
            Err(Error::DegenerateTree { size: 1 })
        ));
        assert!(matches!(
            HuffmanTree::from_counts(&[]),
            Err(Error::EmptyVocabulary)
        ));
    }

    #[test]
    fn two_tokens() {
        let tree = HuffmanTree::from_counts(&[5, 3]).unwrap();
        assert_eq!(tree.num_nodes(), 3);
        assert_eq!(tree.root(), 2);
        // 3 < 5, so token 1 is popped first and goes left.
        assert_eq!(tree.code(1), [0]);
        assert_eq!(tree.code(0), [1]);
        assert_eq!(tree.path(0), [2]);
        assert!(tree.node(1).is_left_child);
        assert!(tree.node(2).code.is_empty());
        assert!(tree.node(2).path.is_empty());
        assert_eq!(tree.node(2).frequency, 8);
    }

    #[test]
    fn known_optimal_code_for_1_1_2_3() {
        let tree = HuffmanTree::from_counts(&[1, 1, 2, 3]).unwrap();
        // merges: (0,1)->4 f=2, (2,4)->5 f=4, (3,5)->6 f=7
        assert_eq!(tree.code(3), [0]);
        assert_eq!(tree.code(2), [1, 0]);
        assert_eq!(tree.code(0), [1, 1, 0]);
        assert_eq!(tree.code(1), [1, 1, 1]);
        assert_eq!(tree.path(1), [6, 5, 4]);
        assert_eq!(tree.weighted_path_length(), 3 + 4 + 3 + 3);
    }

    #[test]
    fn ties_break_on_id() {
        let tree = HuffmanTree::from_counts(&[4, 4, 4, 4]).unwrap();
        assert_eq!(tree.node(4).left, Some(0));
        assert_eq!(tree.node(4).right, Some(1));
        assert_eq!(tree.node(5).left, Some(2));
        assert_eq!(tree.node(5).right, Some(3));
        assert_eq!(tree.node(6).left, Some(4));
        assert_eq!(tree.node(6).right, Some(5));
        for leaf in 0..4 {
            assert_eq!(tree.code(leaf).len(), 2);
        }
    }
}
