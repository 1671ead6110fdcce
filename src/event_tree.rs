use identity_hash::IntMap;

pub type NodeID = usize;

/// A node of an ordered rooted tree. Children are kept in insertion
/// order; the parent backlink is `None` for the root only.
#[derive(Debug, Clone)]
pub struct Node<T> {
    pub children: Vec<NodeID>,
    pub parent: Option<NodeID>,
    pub value: T,
}

/// Arena-allocated ordered rooted tree.
///
/// Nodes are addressed by stable integer handles; a handle remains
/// valid until that specific node is removed from the tree. All local
/// rewrites (`wrap`, `flatten`, `erase`) preserve the handles of the
/// surviving nodes.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    current_id: NodeID,
    root: NodeID,
    nodes: IntMap<NodeID, Node<T>>,
}

impl<T> std::ops::Index<NodeID> for Tree<T> {
    type Output = Node<T>;

    fn index(&self, n: NodeID) -> &Self::Output {
        &self.nodes[&n]
    }
}

impl<T> std::ops::IndexMut<NodeID> for Tree<T> {
    fn index_mut(&mut self, n: NodeID) -> &mut Self::Output {
        self.nodes.get_mut(&n).unwrap()
    }
}

impl<T> Tree<T> {
    pub fn new(root_value: T) -> Self {
        let mut nodes: IntMap<NodeID, Node<T>> = Default::default();
        nodes.insert(
            0,
            Node { children: Vec::with_capacity(2), parent: None, value: root_value },
        );

        Tree { current_id: 0, root: 0, nodes }
    }

    pub fn root(&self) -> NodeID {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, n: NodeID) -> bool {
        self.nodes.contains_key(&n)
    }

    pub fn children(&self, n: NodeID) -> &[NodeID] {
        &self.nodes[&n].children
    }

    pub fn number_of_children(&self, n: NodeID) -> usize {
        self.nodes[&n].children.len()
    }

    pub fn child(&self, n: NodeID, i: usize) -> NodeID {
        self.nodes[&n].children[i]
    }

    pub fn parent(&self, n: NodeID) -> Option<NodeID> {
        self.nodes[&n].parent
    }

    pub fn is_leaf(&self, n: NodeID) -> bool {
        self.nodes[&n].children.is_empty()
    }

    /// Append a new node under `parent` and return its handle.
    pub fn add_node(&mut self, value: T, parent: NodeID) -> NodeID {
        assert!(self.nodes.contains_key(&parent));

        self.current_id = self.current_id.checked_add(1).expect("tree is too big");
        let id = self.current_id;

        self.nodes.insert(
            id,
            Node { children: Vec::with_capacity(2), parent: Some(parent), value },
        );
        self.nodes.get_mut(&parent).unwrap().children.push(id);

        id
    }

    /// Insert a new parent between `child` and its current parent. The
    /// new node takes `child`'s place in the former parent's children
    /// list; if `child` was the root, the new node becomes the root.
    pub fn wrap(&mut self, child: NodeID, value: T) -> NodeID {
        assert!(self.nodes.contains_key(&child));

        self.current_id = self.current_id.checked_add(1).expect("tree is too big");
        let id = self.current_id;
        let parent = self.nodes[&child].parent;

        self.nodes.insert(id, Node { children: vec![child], parent, value });
        self.nodes.get_mut(&child).unwrap().parent = Some(id);

        match parent {
            Some(p) => {
                let siblings = &mut self.nodes.get_mut(&p).unwrap().children;
                let slot = siblings.iter().position(|&c| c == child).unwrap();
                siblings[slot] = id;
            }
            None => self.root = id,
        }

        id
    }

    /// Lift the children of `n` to `n`'s level: they are inserted among
    /// `n`'s siblings, right after it, and `n` becomes childless.
    pub fn flatten(&mut self, n: NodeID) {
        let parent = self.nodes[&n].parent.expect("cannot flatten the root");
        let lifted = std::mem::take(&mut self.nodes.get_mut(&n).unwrap().children);

        for &c in &lifted {
            self.nodes.get_mut(&c).unwrap().parent = Some(parent);
        }

        let siblings = &mut self.nodes.get_mut(&parent).unwrap().children;
        let slot = siblings.iter().position(|&c| c == n).unwrap();
        siblings.splice(slot + 1..slot + 1, lifted);
    }

    /// Remove `n` from the tree; its parent adopts its children in
    /// `n`'s former slot. Removing a root with a single child promotes
    /// that child to root.
    pub fn erase(&mut self, n: NodeID) {
        let node = self.nodes.remove(&n).unwrap();

        match node.parent {
            Some(p) => {
                for &c in &node.children {
                    self.nodes.get_mut(&c).unwrap().parent = Some(p);
                }

                let siblings = &mut self.nodes.get_mut(&p).unwrap().children;
                let slot = siblings.iter().position(|&c| c == n).unwrap();
                siblings.splice(slot..slot + 1, node.children);
            }
            None => {
                assert!(
                    node.children.len() == 1,
                    "erasing the root requires it to have exactly one child"
                );
                let new_root = node.children[0];
                self.nodes.get_mut(&new_root).unwrap().parent = None;
                self.root = new_root;
            }
        }
    }

    /// Delete the whole subtree below `n`, keeping `n` itself.
    pub fn erase_children(&mut self, n: NodeID) {
        let children = std::mem::take(&mut self.nodes.get_mut(&n).unwrap().children);

        for c in children {
            self.delete_subtree(c);
        }
    }

    fn delete_subtree(&mut self, n: NodeID) {
        let node = self.nodes.remove(&n).unwrap();

        for c in node.children {
            self.delete_subtree(c);
        }
    }

    fn collect_postorder(&self, n: NodeID, out: &mut Vec<NodeID>) {
        for &c in &self.nodes[&n].children {
            self.collect_postorder(c, out);
        }
        out.push(n);
    }

    fn collect_preorder(&self, n: NodeID, out: &mut Vec<NodeID>) {
        out.push(n);
        for &c in &self.nodes[&n].children {
            self.collect_preorder(c, out);
        }
    }

    /// Handles of all nodes, children before parents.
    pub fn postorder(&self) -> Vec<NodeID> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.collect_postorder(self.root, &mut out);
        out
    }

    /// Handles of all nodes, parents before children, in document order.
    pub fn preorder(&self) -> Vec<NodeID> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.collect_preorder(self.root, &mut out);
        out
    }

    /// Rebuild the same tree shape with converted payloads.
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> Tree<U> {
        let mut nodes: IntMap<NodeID, Node<U>> = Default::default();

        for (&id, node) in &self.nodes {
            nodes.insert(
                id,
                Node {
                    children: node.children.clone(),
                    parent: node.parent,
                    value: f(&node.value),
                },
            );
        }

        Tree { current_id: self.current_id, root: self.root, nodes }
    }

    /// Fallible variant of [`Tree::map`].
    pub fn try_map<U, E>(
        &self,
        f: impl Fn(&T) -> Result<U, E>,
    ) -> Result<Tree<U>, E> {
        let mut nodes: IntMap<NodeID, Node<U>> = Default::default();

        for (&id, node) in &self.nodes {
            nodes.insert(
                id,
                Node {
                    children: node.children.clone(),
                    parent: node.parent,
                    value: f(&node.value)?,
                },
            );
        }

        Ok(Tree { current_id: self.current_id, root: self.root, nodes })
    }
}

impl<T: PartialEq> Tree<T> {
    fn subtree_eq(&self, n: NodeID, other: &Tree<T>, m: NodeID) -> bool {
        if self.nodes[&n].value != other.nodes[&m].value {
            return false;
        }

        let ours = &self.nodes[&n].children;
        let theirs = &other.nodes[&m].children;

        ours.len() == theirs.len()
            && ours
                .iter()
                .zip(theirs.iter())
                .all(|(&a, &b)| self.subtree_eq(a, other, b))
    }
}

/// Structural equality: same shape, same payloads, regardless of the
/// handles assigned to the nodes.
impl<T: PartialEq> PartialEq for Tree<T> {
    fn eq(&self, other: &Self) -> bool {
        self.subtree_eq(self.root, other, other.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Tree<&'static str>, NodeID, NodeID, NodeID, NodeID) {
        // root -> (a -> (c, d), b)
        let mut tree = Tree::new("root");
        let a = tree.add_node("a", tree.root());
        let b = tree.add_node("b", tree.root());
        let c = tree.add_node("c", a);
        let d = tree.add_node("d", a);
        (tree, a, b, c, d)
    }

    #[test]
    fn traversal_orders() {
        let (tree, a, b, c, d) = sample();

        let values = |ids: &[NodeID]| -> Vec<&str> {
            ids.iter().map(|&n| tree[n].value).collect()
        };

        assert_eq!(tree.postorder(), vec![c, d, a, b, tree.root()]);
        assert_eq!(tree.preorder(), vec![tree.root(), a, c, d, b]);
        assert_eq!(values(&tree.postorder()), vec!["c", "d", "a", "b", "root"]);
    }

    #[test]
    fn child_access() {
        let (tree, a, b, c, d) = sample();

        assert_eq!(tree.children(tree.root()), &[a, b]);
        assert_eq!(tree.number_of_children(a), 2);
        assert_eq!(tree.child(a, 0), c);
        assert_eq!(tree.parent(d), Some(a));
        assert_eq!(tree.parent(tree.root()), None);
        assert!(tree.is_leaf(b));
        assert!(!tree.is_leaf(a));
    }

    #[test]
    fn wrap_inserts_a_parent() {
        let (mut tree, a, _b, c, d) = sample();

        let w = tree.wrap(a, "w");

        assert_eq!(tree.parent(a), Some(w));
        assert_eq!(tree.children(w), &[a]);
        assert_eq!(tree.child(tree.root(), 0), w);
        assert_eq!(tree.children(a), &[c, d]);
        assert_eq!(tree.preorder().len(), 6);
    }

    #[test]
    fn wrap_root() {
        let (mut tree, ..) = sample();

        let old_root = tree.root();
        let w = tree.wrap(old_root, "w");

        assert_eq!(tree.root(), w);
        assert_eq!(tree.parent(old_root), Some(w));
        assert_eq!(tree.parent(w), None);
    }

    #[test]
    fn erase_gives_children_to_parent() {
        let (mut tree, a, b, c, d) = sample();

        tree.erase(a);

        assert_eq!(tree.children(tree.root()), &[c, d, b]);
        assert_eq!(tree.parent(c), Some(tree.root()));
        assert_eq!(tree.parent(d), Some(tree.root()));
        assert!(!tree.contains(a));
    }

    #[test]
    fn erase_root_promotes_single_child() {
        let mut tree = Tree::new("root");
        let a = tree.add_node("a", tree.root());
        let b = tree.add_node("b", a);

        tree.erase(tree.root());

        assert_eq!(tree.root(), a);
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.children(a), &[b]);
    }

    #[test]
    fn flatten_lifts_children() {
        let (mut tree, a, b, c, d) = sample();

        tree.flatten(a);

        assert_eq!(tree.children(tree.root()), &[a, c, d, b]);
        assert!(tree.is_leaf(a));
        assert_eq!(tree.parent(c), Some(tree.root()));
    }

    #[test]
    fn erase_children_removes_subtree() {
        let (mut tree, a, b, c, d) = sample();

        tree.erase_children(a);

        assert!(tree.is_leaf(a));
        assert!(!tree.contains(c));
        assert!(!tree.contains(d));
        assert!(tree.contains(b));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn structural_equality() {
        let (t1, ..) = sample();
        let (mut t2, _a, b, ..) = sample();

        assert_eq!(t1, t2);

        t2[b].value = "e";
        assert_ne!(t1, t2);
    }

    #[test]
    fn map_preserves_shape() {
        let (tree, ..) = sample();
        let mapped = tree.map(|v| v.len());

        assert_eq!(mapped.preorder().len(), 5);
        assert_eq!(mapped[mapped.root()].value, 4);
    }
}
