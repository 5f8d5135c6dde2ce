use std::sync::atomic::{AtomicU64, Ordering};

use super::{NodeId, NodeKind};

/// Source of fresh node ids.
///
/// The only contract is uniqueness; callers must not depend on the format.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: NodeKind) -> NodeId;
}

fn prefix(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Rule => "r",
        NodeKind::Group => "g",
    }
}

/// Random v4 uuids, `r-<uuid>` for rules and `g-<uuid>` for groups.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self, kind: NodeKind) -> NodeId {
        NodeId::new(format!("{}-{}", prefix(kind), uuid::Uuid::new_v4()))
    }
}

/// Deterministic counter shared by both kinds: `r-1`, `g-2`, `r-3`, ...
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        SequentialIds {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self, kind: NodeKind) -> NodeId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        NodeId::new(format!("{}-{n}", prefix(kind)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn sequential_counts_across_kinds() {
        let ids = SequentialIds::new();
        assert_eq!(ids.next_id(NodeKind::Rule).as_str(), "r-1");
        assert_eq!(ids.next_id(NodeKind::Group).as_str(), "g-2");
        assert_eq!(ids.next_id(NodeKind::Rule).as_str(), "r-3");
    }

    #[test]
    fn random_ids_are_unique() {
        let ids = RandomIds;
        let seen: HashSet<NodeId> = (0..500).map(|_| ids.next_id(NodeKind::Rule)).collect();
        assert_eq!(seen.len(), 500);
    }

    #[test]
    fn random_ids_carry_kind_prefix() {
        assert!(RandomIds.next_id(NodeKind::Group).as_str().starts_with("g-"));
        assert!(RandomIds.next_id(NodeKind::Rule).as_str().starts_with("r-"));
    }
}
