//! Unbalanced binary search tree keyed by byte strings
//!
//! Nodes live in an arena and link to each other by index, including a
//! parent link used for in-order stepping. Keys compare byte-wise with the
//! shorter key first on a common prefix, which is the ordering of `[u8]`.

use std::cmp::Ordering;

type NodeId = usize;

#[derive(Debug, Clone)]
struct Node<V> {
    key: Box<[u8]>,
    value: V,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Tree<V> {
    nodes: Vec<Node<V>>,
    root: Option<NodeId>,
}

impl<V> Default for Tree<V> {
    fn default() -> Self {
        Self::new()
    }
}

enum Side {
    Left,
    Right,
}

impl<V> Tree<V> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn find(&self, key: &[u8]) -> Option<NodeId> {
        let mut current = self.root;
        while let Some(id) = current {
            let node = &self.nodes[id];
            current = match key.cmp(&node.key) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        self.find(key).map(|id| &self.nodes[id].value)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        self.find(key).map(move |id| &mut self.nodes[id].value)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    /// Insert or overwrite, returning the previous value
    pub fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        let mut parent = None;
        let mut current = self.root;
        while let Some(id) = current {
            let node = &mut self.nodes[id];
            match key.cmp(&node.key) {
                Ordering::Less => {
                    parent = Some((id, Side::Left));
                    current = node.left;
                }
                Ordering::Greater => {
                    parent = Some((id, Side::Right));
                    current = node.right;
                }
                Ordering::Equal => return Some(std::mem::replace(&mut node.value, value)),
            }
        }
        self.attach(key.into(), value, parent);
        None
    }

    fn attach(&mut self, key: Box<[u8]>, value: V, parent: Option<(NodeId, Side)>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            key,
            value,
            left: None,
            right: None,
            parent: parent.as_ref().map(|(p, _)| *p),
        });
        match parent {
            None => self.root = Some(id),
            Some((p, Side::Left)) => self.nodes[p].left = Some(id),
            Some((p, Side::Right)) => self.nodes[p].right = Some(id),
        }
        id
    }

    /// Longest root-to-leaf path, counted in nodes
    pub fn height(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((id, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            let node = &self.nodes[id];
            stack.extend(node.left.iter().chain(&node.right).map(|&c| (c, depth + 1)));
        }
        deepest
    }

    /// In-order iteration
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            tree: self,
            cursor: self.root.map(|root| self.leftmost(root)),
            done: self.root.is_none(),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.nodes.iter().map(|node| &node.value)
    }

    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.nodes[id].left {
            id = left;
        }
        id
    }

    fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(right) = self.nodes[id].right {
            return Some(self.leftmost(right));
        }
        let mut child = id;
        let mut parent = self.nodes[id].parent;
        while let Some(p) = parent {
            if self.nodes[p].left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.nodes[p].parent;
        }
        None
    }
}

impl<V: Clone> Tree<V> {
    /// Node-for-node copy with the same shape, keys and values. The copy
    /// shares no nodes with `self`.
    pub fn copy(&self) -> Tree<V> {
        let mut out = Tree {
            nodes: Vec::with_capacity(self.nodes.len()),
            root: None,
        };
        let mut stack: Vec<(NodeId, Option<(NodeId, Side)>)> =
            self.root.map(|r| (r, None)).into_iter().collect();
        while let Some((source, link)) = stack.pop() {
            let node = &self.nodes[source];
            let id = out.attach(node.key.clone(), node.value.clone(), link);
            if let Some(right) = node.right {
                stack.push((right, Some((id, Side::Right))));
            }
            if let Some(left) = node.left {
                stack.push((left, Some((id, Side::Left))));
            }
        }
        out
    }
}

/// Forward-only cursor. Once it steps past the last node it stays finished.
pub struct Iter<'a, V> {
    tree: &'a Tree<V>,
    cursor: Option<NodeId>,
    done: bool,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a [u8], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(id) = self.cursor else {
            self.done = true;
            return None;
        };
        self.cursor = self.tree.successor(id);
        self.done = self.cursor.is_none();
        let node = &self.tree.nodes[id];
        Some((&*node.key, &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(keys: &[&str]) -> Tree<usize> {
        let mut tree = Tree::new();
        for (i, key) in keys.iter().enumerate() {
            tree.insert(key.as_bytes(), i);
        }
        tree
    }

    #[test]
    fn test_insert_get_overwrite() {
        let mut tree = tree_of(&["m", "c", "x"]);
        assert_eq!(tree.get(b"c"), Some(&1));
        assert_eq!(tree.insert(b"c", 10), Some(1));
        assert_eq!(tree.get(b"c"), Some(&10));
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(b"q"), None);
    }

    #[test]
    fn test_in_order_with_prefix_keys() {
        let tree = tree_of(&["ab", "a", "b", "abc", ""]);
        let keys: Vec<&[u8]> = tree.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![&b""[..], &b"a"[..], &b"ab"[..], &b"abc"[..], &b"b"[..]]
        );
    }

    #[test]
    fn test_iterator_stays_finished() {
        let tree = tree_of(&["a"]);
        let mut iter = tree.iter();
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_unbalanced_height() {
        let tree = tree_of(&["a", "b", "c", "d"]);
        assert_eq!(tree.height(), 4);
        let tree = tree_of(&["b", "a", "c"]);
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn test_copy_mirrors_both_subtrees() {
        let tree = tree_of(&["m", "c", "x", "a", "e", "z"]);
        let mut copy = tree.copy();
        assert_eq!(copy.height(), tree.height());
        let original: Vec<_> = tree.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
        let copied: Vec<_> = copy.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
        assert_eq!(original, copied);

        copy.insert(b"c", 99);
        copy.insert(b"new", 7);
        assert_eq!(tree.get(b"c"), Some(&1));
        assert!(!tree.contains_key(b"new"));
    }
}
