//! Path-indexed event trie.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]; each node maps
//! literal child segments to child ids and holds the events published at
//! exactly its path, newest first. Nodes are created on first insertion and
//! never removed.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::event::CueEvent;
use crate::matcher::{accepts, ValueMatcher};
use crate::path::{CuePath, PathPattern, PatternSegment};
use crate::time::LogicalTime;

/// Index of a node in the trie arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node.
    pub const ROOT: Self = Self(0);
}

/// Which side of the query time a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Latest event at or before the query time.
    MostRecent,
    /// Earliest event strictly after the query time.
    Next,
}

impl Direction {
    /// Merges two branch results: greatest for `MostRecent`, least for `Next`.
    fn pick<'a>(self, best: Option<&'a CueEvent>, candidate: Option<&'a CueEvent>) -> Option<&'a CueEvent> {
        match (best, candidate) {
            (None, c) => c,
            (b, None) => b,
            (Some(b), Some(c)) => {
                let wanted = match self {
                    Self::MostRecent => Ordering::Greater,
                    Self::Next => Ordering::Less,
                };
                if c.order(b) == wanted {
                    Some(c)
                } else {
                    Some(b)
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, NodeId>,
    events: VecDeque<CueEvent>,
}

/// State shared by every step of one traversal.
struct Traversal<'q> {
    time: &'q LogicalTime,
    matcher: Option<&'q ValueMatcher>,
    direction: Direction,
    segments: &'q [PatternSegment],
    seen: HashSet<(NodeId, usize)>,
}

/// Arena-backed trie of cue events.
#[derive(Debug)]
pub struct EventTrie {
    nodes: Vec<TrieNode>,
    event_count: usize,
}

impl Default for EventTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTrie {
    /// Creates a trie holding only the root node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
            event_count: 0,
        }
    }

    /// Inserts an event at its path, creating missing nodes.
    pub fn insert(&mut self, event: CueEvent) {
        let mut node = NodeId::ROOT;
        for segment in event.path.segments() {
            node = self.child_or_insert(node, segment);
        }

        let events = &mut self.nodes[node.0].events;
        events.push_front(event);
        bubble_into_place(events);
        self.event_count += 1;
    }

    /// Total number of stored events.
    #[must_use]
    pub const fn event_count(&self) -> usize {
        self.event_count
    }

    /// Total number of nodes, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Events stored at exactly `path`, newest first.
    #[must_use]
    pub fn events_at(&self, path: &CuePath) -> Vec<&CueEvent> {
        let mut node = NodeId::ROOT;
        for segment in path.segments() {
            match self.child(node, segment) {
                Some(child) => node = child,
                None => return Vec::new(),
            }
        }
        self.nodes[node.0].events.iter().collect()
    }

    /// Latest event matching `pattern` at or before `time`.
    #[must_use]
    pub fn most_recent_before(
        &self,
        time: &LogicalTime,
        pattern: &PathPattern,
        matcher: Option<&ValueMatcher>,
    ) -> Option<&CueEvent> {
        self.find(time, pattern, matcher, Direction::MostRecent)
    }

    /// Earliest event matching `pattern` strictly after `time`.
    #[must_use]
    pub fn next_after(
        &self,
        time: &LogicalTime,
        pattern: &PathPattern,
        matcher: Option<&ValueMatcher>,
    ) -> Option<&CueEvent> {
        self.find(time, pattern, matcher, Direction::Next)
    }

    /// Runs a query in the given direction.
    #[must_use]
    pub fn find(
        &self,
        time: &LogicalTime,
        pattern: &PathPattern,
        matcher: Option<&ValueMatcher>,
        direction: Direction,
    ) -> Option<&CueEvent> {
        let mut traversal = Traversal {
            time,
            matcher,
            direction,
            segments: pattern.segments(),
            seen: HashSet::new(),
        };
        self.search(NodeId::ROOT, 0, &mut traversal)
    }

    /// Best match for `segments[idx..]` below `node`.
    ///
    /// Each `(node, idx)` pair is expanded at most once per traversal. A
    /// repeat visit returns `None`: its result already went into the merge.
    fn search(&self, node: NodeId, idx: usize, traversal: &mut Traversal<'_>) -> Option<&CueEvent> {
        if !traversal.seen.insert((node, idx)) {
            return None;
        }

        let segments = traversal.segments;
        let Some(head) = segments.get(idx) else {
            return self.find_in_node(node, traversal);
        };

        let direction = traversal.direction;
        let mut best = None;
        match head {
            PatternSegment::Literal(literal) => {
                if let Some(child) = self.child(node, literal) {
                    best = self.search(child, idx + 1, traversal);
                }
            }

            PatternSegment::Wildcard(re) => {
                for (key, &child) in &self.nodes[node.0].children {
                    if re.is_match(key) {
                        best = direction.pick(best, self.search(child, idx + 1, traversal));
                    }
                }
            }

            PatternSegment::Recursive => match segments.get(idx + 1) {
                None => {
                    for d in self.descendants(node) {
                        best = direction.pick(best, self.search(d, idx + 1, traversal));
                    }
                }
                Some(next) => {
                    for d in self.matching_descendants(node, next) {
                        best = direction.pick(best, self.search(d, idx + 2, traversal));
                    }
                }
            },
        }
        best
    }

    fn find_in_node(&self, node: NodeId, traversal: &Traversal<'_>) -> Option<&CueEvent> {
        let events = &self.nodes[node.0].events;
        match traversal.direction {
            Direction::MostRecent => events
                .iter()
                .find(|e| e.is_at_or_before(traversal.time) && accepts(traversal.matcher, &e.value)),
            Direction::Next => {
                // Newest first, so the events after the query time form a
                // prefix. Walk it from its oldest end toward newer entries.
                let boundary = events.partition_point(|e| e.is_after(traversal.time));
                (0..boundary)
                    .rev()
                    .map(|i| &events[i])
                    .find(|e| accepts(traversal.matcher, &e.value))
            }
        }
    }

    fn child(&self, node: NodeId, segment: &str) -> Option<NodeId> {
        self.nodes[node.0].children.get(segment).copied()
    }

    fn child_or_insert(&mut self, node: NodeId, segment: &str) -> NodeId {
        if let Some(child) = self.child(node, segment) {
            return child;
        }
        let child = NodeId(self.nodes.len());
        self.nodes.push(TrieNode::default());
        self.nodes[node.0].children.insert(segment.to_string(), child);
        child
    }

    /// Every node strictly below `node`.
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[node.0].children.values().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n.0].children.values().copied());
        }
        out
    }

    /// Every node strictly below `node` whose own segment matches `segment`.
    fn matching_descendants(&self, node: NodeId, segment: &PatternSegment) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            for (key, &child) in &self.nodes[n.0].children {
                if segment.matches_segment(key) {
                    out.push(child);
                }
                stack.push(child);
            }
        }
        out
    }

    #[cfg(test)]
    fn is_sorted_everywhere(&self) -> bool {
        self.nodes.iter().all(|n| {
            n.events
                .iter()
                .zip(n.events.iter().skip(1))
                .all(|(a, b)| a.order(b) != Ordering::Less)
        })
    }
}

/// Moves the front element toward the back until the list is newest first.
///
/// The rest of the list is already ordered, so this is O(1) for in-order
/// arrivals and O(k) for an event k places out of order.
fn bubble_into_place(events: &mut VecDeque<CueEvent>) {
    let mut idx = 0;
    while idx + 1 < events.len() && events[idx].order(&events[idx + 1]) == Ordering::Less {
        events.swap(idx, idx + 1);
        idx += 1;
    }
}
