//! Depth-first traversal primitives shared by the read path ([`crate::schema`])
//! and the write path ([`crate::editor`]).
//!
//! All searches start below a group and never match that group itself;
//! callers check the root id separately.

use std::sync::Arc;

use super::{Group, Node, NodeId};

/// A node located below some group.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Hit<'a> {
    pub node: &'a Node,
    pub parent: &'a Group,
    /// Groups strictly between the search root and the node.
    pub level: usize,
}

pub(crate) fn find<'a>(group: &'a Group, id: &str) -> Option<Hit<'a>> {
    find_at(group, id, 0)
}

fn find_at<'a>(group: &'a Group, id: &str, level: usize) -> Option<Hit<'a>> {
    for child in &group.rules {
        if *child.id() == *id {
            return Some(Hit {
                node: child,
                parent: group,
                level,
            });
        }
        if let Node::Group(sub) = child {
            if let Some(hit) = find_at(sub, id, level + 1) {
                return Some(hit);
            }
        }
    }
    None
}

/// Child indices leading from `group` to the node with `id`.
pub(crate) fn path_to(group: &Group, id: &str) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    if push_path(group, id, &mut path) {
        path.reverse();
        Some(path)
    } else {
        None
    }
}

// Pushes indices deepest-first while unwinding.
fn push_path(group: &Group, id: &str, path: &mut Vec<usize>) -> bool {
    for (index, child) in group.rules.iter().enumerate() {
        let found = *child.id() == *id
            || matches!(child, Node::Group(sub) if push_path(sub, id, path));
        if found {
            path.push(index);
            return true;
        }
    }
    false
}

/// Node addressed by a path from [`path_to`] on the same tree.
pub(crate) fn node_at<'a>(group: &'a Group, path: &[usize]) -> Option<&'a Node> {
    let (&index, rest) = path.split_first()?;
    let child = group.rules.get(index)?;
    if rest.is_empty() {
        return Some(child);
    }
    match child {
        Node::Group(sub) => node_at(sub, rest),
        Node::Rule(_) => None,
    }
}

/// Rebuilds every group along `path`, handing the addressed node to `edit`.
/// `edit` returning `None` drops the node. Siblings and untouched subtrees
/// are shared with the input by reference.
pub(crate) fn rebuild<F>(group: &Group, path: &[usize], edit: F) -> Group
where
    F: FnOnce(&Node) -> Option<Node>,
{
    let Some((&index, rest)) = path.split_first() else {
        return group.clone();
    };
    let Some(child) = group.rules.get(index) else {
        return group.clone();
    };

    let mut rules = group.rules.clone();
    if rest.is_empty() {
        match edit(child) {
            Some(node) => rules[index] = node,
            None => {
                rules.remove(index);
            }
        }
    } else if let Node::Group(sub) = child {
        rules[index] = Node::Group(Arc::new(rebuild(sub, rest, edit)));
    }
    group.with_rules(rules)
}

pub(crate) fn count(group: &Group) -> usize {
    group
        .rules
        .iter()
        .map(|child| match child {
            Node::Rule(_) => 1,
            Node::Group(sub) => 1 + count(sub),
        })
        .sum()
}

pub(crate) fn collect_ids(group: &Group, out: &mut Vec<NodeId>) {
    for child in &group.rules {
        out.push(child.id().clone());
        if let Node::Group(sub) = child {
            collect_ids(sub, out);
        }
    }
}
