//! A general labelled tree, used to inspect the element hierarchy of a
//! single DICOM dataset.
//!
//! Children are owned by their parent. A node is built standalone and then
//! moved into its parent with [`Node::attach`], so a node can never appear
//! twice in the tree and cannot be re-parented once attached.

use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("No node found matching the filter")]
    NotFound,
}

/// Glyphs used by [`Node::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStyle<'a> {
    /// Continuation below a sibling that is not the last one.
    pub vertical: &'a str,
    /// Prefix of a child that is not the last one.
    pub branch: &'a str,
    /// Prefix of the last child.
    pub end: &'a str,
    /// Continuation below the last child.
    pub blank: &'a str,
}

impl TreeStyle<'static> {
    pub const ASCII: TreeStyle<'static> = TreeStyle {
        vertical: "|   ",
        branch: "|-- ",
        end: "+-- ",
        blank: "    ",
    };

    pub const UNICODE: TreeStyle<'static> = TreeStyle {
        vertical: "\u{2502}   ",
        branch: "\u{251c}\u{2500}\u{2500} ",
        end: "\u{2514}\u{2500}\u{2500} ",
        blank: "    ",
    };
}

impl Default for TreeStyle<'static> {
    fn default() -> Self {
        TreeStyle::UNICODE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node<D> {
    pub label: String,
    pub data: D,
    children: Vec<Node<D>>,
}

impl<D> Node<D> {
    pub fn new(label: impl Into<String>, data: D) -> Self {
        Self {
            label: label.into(),
            data,
            children: Vec::new(),
        }
    }

    /// Move this node to the end of `parent`'s children and return a
    /// reference to it at its new place.
    pub fn attach(self, parent: &mut Node<D>) -> &mut Node<D> {
        parent.children.push(self);
        let last = parent.children.len() - 1;
        &mut parent.children[last]
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[Node<D>] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn len(&self) -> usize {
        self.bfs().count()
    }

    pub fn bfs(&self) -> Bfs<'_, D> {
        Bfs {
            queue: VecDeque::from([self]),
        }
    }

    pub fn dfs(&self) -> Dfs<'_, D> {
        Dfs { stack: vec![self] }
    }

    /// The parent of `child` within the subtree rooted at `self`, if any.
    ///
    /// Nodes are matched by identity, not by value.
    pub fn parent_of(&self, child: &Node<D>) -> Option<&Node<D>> {
        self.bfs()
            .find(|node| node.children.iter().any(|c| std::ptr::eq(c, child)))
    }

    /// Render the label of this node and of every descendant, one per line.
    pub fn render(&self, style: &TreeStyle<'_>, line_separator: &str) -> String {
        let mut lines = vec![self.label.clone()];
        Self::render_children(self, style, "", &mut lines);
        lines.join(line_separator)
    }

    fn render_children(
        node: &Node<D>,
        style: &TreeStyle<'_>,
        prefix: &str,
        lines: &mut Vec<String>,
    ) {
        let count = node.children.len();
        for (i, child) in node.children.iter().enumerate() {
            let (glyph, continuation) = if i + 1 < count {
                (style.branch, style.vertical)
            } else {
                (style.end, style.blank)
            };
            lines.push(format!("{prefix}{glyph}{}", child.label));
            Self::render_children(child, style, &format!("{prefix}{continuation}"), lines);
        }
    }
}

impl<D> fmt::Display for Node<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&TreeStyle::UNICODE, "\n"))
    }
}

/// Breadth-first iterator over a tree.
pub struct Bfs<'a, D> {
    queue: VecDeque<&'a Node<D>>,
}

impl<'a, D> Iterator for Bfs<'a, D> {
    type Item = &'a Node<D>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        self.queue.extend(node.children.iter());
        Some(node)
    }
}

/// Depth-first (pre-order) iterator over a tree.
pub struct Dfs<'a, D> {
    stack: Vec<&'a Node<D>>,
}

impl<'a, D> Iterator for Dfs<'a, D> {
    type Item = &'a Node<D>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // reversed so that the first child is popped first
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    #[default]
    BreadthFirst,
    DepthFirst,
}

enum Walk<'a, D> {
    Bfs(Bfs<'a, D>),
    Dfs(Dfs<'a, D>),
}

impl<'a, D> Iterator for Walk<'a, D> {
    type Item = &'a Node<D>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Walk::Bfs(it) => it.next(),
            Walk::Dfs(it) => it.next(),
        }
    }
}

fn walk<D>(root: &Node<D>, traversal: Traversal) -> Walk<'_, D> {
    match traversal {
        Traversal::BreadthFirst => Walk::Bfs(root.bfs()),
        Traversal::DepthFirst => Walk::Dfs(root.dfs()),
    }
}

/// The first node, in `traversal` order, that matches `predicate`.
pub fn find_first<D, F>(
    root: &Node<D>,
    predicate: F,
    traversal: Traversal,
) -> Result<&Node<D>, TreeError>
where
    F: Fn(&Node<D>) -> bool,
{
    walk(root, traversal)
        .find(|node| predicate(*node))
        .ok_or(TreeError::NotFound)
}

/// Every node, in `traversal` order, that matches `predicate`.
pub fn find_all<D, F>(root: &Node<D>, predicate: F, traversal: Traversal) -> Vec<&Node<D>>
where
    F: Fn(&Node<D>) -> bool,
{
    walk(root, traversal).filter(|node| predicate(*node)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Udo
    // ├── Marc
    // │   └── Lian
    // └── Dan
    //     ├── Jet
    //     ├── Jan
    //     └── Joe
    fn family() -> Node<u32> {
        let mut udo = Node::new("Udo", 0);
        let marc = Node::new("Marc", 1).attach(&mut udo);
        Node::new("Lian", 2).attach(marc);
        let dan = Node::new("Dan", 3).attach(&mut udo);
        for (label, data) in [("Jet", 4), ("Jan", 5), ("Joe", 6)] {
            Node::new(label, data).attach(dan);
        }
        udo
    }

    fn labels<'a>(nodes: impl Iterator<Item = &'a Node<u32>>) -> Vec<&'a str> {
        nodes.map(|n| n.label.as_str()).collect()
    }

    #[test]
    fn breadth_first_order() {
        let tree = family();
        assert_eq!(
            labels(tree.bfs()),
            ["Udo", "Marc", "Dan", "Lian", "Jet", "Jan", "Joe"]
        );
    }

    #[test]
    fn depth_first_order() {
        let tree = family();
        assert_eq!(
            labels(tree.dfs()),
            ["Udo", "Marc", "Lian", "Dan", "Jet", "Jan", "Joe"]
        );
    }

    #[test]
    fn traversals_visit_every_node_once() {
        let tree = family();
        assert_eq!(tree.len(), 7);
        for traversal in [Traversal::BreadthFirst, Traversal::DepthFirst] {
            let mut seen: Vec<u32> = walk(&tree, traversal).map(|n| n.data).collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..7).collect::<Vec<_>>());
        }
    }

    #[test]
    fn render_unicode() {
        let expected = "Udo\n\
                        ├── Marc\n\
                        │   └── Lian\n\
                        └── Dan\n    \
                        ├── Jet\n    \
                        ├── Jan\n    \
                        └── Joe";
        let rendered = family().render(&TreeStyle::UNICODE, "\n");
        assert_eq!(rendered, expected);
        assert_eq!(rendered.lines().count(), 7);
        assert_eq!(rendered.lines().next(), Some("Udo"));
    }

    #[test]
    fn render_ascii_and_custom_separator() {
        let mut root = Node::new("root", ());
        let sub0 = Node::new("sub0", ()).attach(&mut root);
        Node::new("sub0B", ()).attach(sub0);
        Node::new("sub1", ()).attach(&mut root);
        assert_eq!(
            root.render(&TreeStyle::ASCII, "\r\n"),
            "root\r\n|-- sub0\r\n|   +-- sub0B\r\n+-- sub1"
        );
    }

    #[test]
    fn custom_style() {
        let style = TreeStyle {
            vertical: ": ",
            branch: "> ",
            end: "> ",
            blank: "  ",
        };
        let mut root = Node::new("a", ());
        Node::new("b", ()).attach(&mut root);
        assert_eq!(root.render(&style, "\n"), "a\n> b");
    }

    #[test]
    fn find_first_and_all() {
        let tree = family();
        let found =
            find_first(&tree, |n| n.label.starts_with('J'), Traversal::BreadthFirst).unwrap();
        assert_eq!(found.label, "Jet");
        let found = find_first(&tree, |n| n.data > 1, Traversal::DepthFirst).unwrap();
        assert_eq!(found.label, "Lian");

        let all = find_all(&tree, |n| n.label.starts_with('J'), Traversal::DepthFirst);
        assert_eq!(labels(all.into_iter()), ["Jet", "Jan", "Joe"]);
    }

    #[test]
    fn no_match() {
        let tree = family();
        assert_eq!(
            find_first(&tree, |n| n.label == "Eve", Traversal::BreadthFirst),
            Err(TreeError::NotFound)
        );
        assert!(find_all(&tree, |n| n.label == "Eve", Traversal::BreadthFirst).is_empty());
    }

    #[test]
    fn parent_lookup() {
        let tree = family();
        let lian = find_first(&tree, |n| n.label == "Lian", Traversal::BreadthFirst).unwrap();
        assert_eq!(tree.parent_of(lian).map(|n| n.label.as_str()), Some("Marc"));
        assert!(tree.parent_of(&tree).is_none());
    }
}
