//! Equivalence graph and join ordering.
//!
//! Column equalities that relate two row sources of a scope become edges of
//! two graphs:
//!
//! ```text
//!   source graph  (reordering)        column graph  (constant propagation)
//!
//!     orders ─── d ─── products         orders.orderId ─── d.orderId
//!                │                      d.productId   ─── products.productId
//!             customers
//! ```
//!
//! The source graph decides where each inner join goes. Order-sensitive
//! joins (`outer`, `asof`, `splice`) stay where they were written and split
//! the join list into segments; inside a segment sources are placed
//! breadth-first from the sources already placed, and sources with no
//! equality at all go last in the order they were declared.
//!
//! Sources reachable at the same step are taken by name, so any
//! permutation of the same inner joins places them identically.
//!
//! The column graph also carries the criteria of order-sensitive joins so a
//! constant known for one side reaches the other.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;
use tracing::trace;

use crate::sql::{ColumnRef, ExprNode};

/// `left = right` where each side is a plain column of a different source.
#[derive(Debug, Clone)]
pub struct Equality {
    pub left: ExprNode,
    pub left_source: usize,
    pub right: ExprNode,
    pub right_source: usize,
}

impl Equality {
    /// The equality written `source.col = other.col`.
    pub fn oriented_to(&self, source: usize) -> ExprNode {
        if self.left_source == source {
            ExprNode::equality(self.left.clone(), self.right.clone())
        } else {
            ExprNode::equality(self.right.clone(), self.left.clone())
        }
    }

    pub fn other_source(&self, source: usize) -> usize {
        if self.left_source == source {
            self.right_source
        } else {
            self.left_source
        }
    }
}

type ColumnKey = (usize, String);

fn column_key(source: usize, column: &ExprNode) -> Option<ColumnKey> {
    column
        .as_column()
        .map(|c| (source, c.name.to_ascii_lowercase()))
}

/// Transient graph over one scope; dropped once joins are placed.
#[derive(Debug)]
pub struct EquivalenceGraph {
    /// Lowercase source names, the tie-break between equally reachable
    /// sources.
    names: Vec<String>,
    sources: UnGraph<usize, usize>,
    source_nodes: Vec<NodeIndex>,
    columns: UnGraph<(usize, ExprNode), ()>,
    column_nodes: HashMap<ColumnKey, NodeIndex>,
    /// Join edges in first-seen order; source graph edges index into it.
    edges: Vec<Equality>,
}

impl EquivalenceGraph {
    /// A graph over sources with the given names; unnamed sources use `""`.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(|n| n.as_ref().to_ascii_lowercase())
            .collect();
        let mut sources = UnGraph::default();
        let source_nodes = (0..names.len()).map(|i| sources.add_node(i)).collect();
        Self {
            names,
            sources,
            source_nodes,
            columns: UnGraph::default(),
            column_nodes: HashMap::new(),
            edges: Vec::new(),
        }
    }

    /// Record an equality that may drive join order.
    pub fn add_join_edge(&mut self, equality: Equality) {
        self.add_equivalence(&equality);
        let (a, b) = (
            self.source_nodes[equality.left_source],
            self.source_nodes[equality.right_source],
        );
        self.sources.add_edge(a, b, self.edges.len());
        self.edges.push(equality);
    }

    /// Record an equality for constant propagation only.
    pub fn add_equivalence(&mut self, equality: &Equality) {
        let left = self.column_node(equality.left_source, &equality.left);
        let right = self.column_node(equality.right_source, &equality.right);
        if let (Some(left), Some(right)) = (left, right) {
            if self.columns.find_edge(left, right).is_none() {
                self.columns.add_edge(left, right, ());
            }
        }
    }

    fn column_node(&mut self, source: usize, column: &ExprNode) -> Option<NodeIndex> {
        let key = column_key(source, column)?;
        let columns = &mut self.columns;
        Some(
            *self
                .column_nodes
                .entry(key)
                .or_insert_with(|| columns.add_node((source, column.clone()))),
        )
    }

    fn connected(&self, a: usize, b: usize) -> bool {
        self.sources
            .find_edge(self.source_nodes[a], self.source_nodes[b])
            .is_some()
    }

    fn has_edges(&self, source: usize) -> bool {
        self.sources
            .neighbors(self.source_nodes[source])
            .next()
            .is_some()
    }

    fn by_name(&self, a: usize, b: usize) -> Ordering {
        self.names[a].cmp(&self.names[b]).then(a.cmp(&b))
    }

    /// Final evaluation order of the scope's sources. Source 0 is the
    /// master and always comes first; `fixed[i]` pins source `i` to its
    /// declared position.
    pub fn order(&self, fixed: &[bool]) -> Vec<usize> {
        let mut placed = vec![0];
        let mut is_placed = vec![false; fixed.len()];
        if let Some(first) = is_placed.first_mut() {
            *first = true;
        }

        let mut segment = Vec::new();
        for source in 1..fixed.len() {
            if fixed[source] {
                self.place_segment(&segment, &mut placed, &mut is_placed);
                segment.clear();
                trace!(source, "order-sensitive join keeps its position");
                placed.push(source);
                is_placed[source] = true;
            } else {
                segment.push(source);
            }
        }
        self.place_segment(&segment, &mut placed, &mut is_placed);
        placed
    }

    fn place_segment(&self, segment: &[usize], placed: &mut Vec<usize>, is_placed: &mut [bool]) {
        let mut queue: VecDeque<usize> = placed.iter().copied().collect();
        loop {
            while let Some(from) = queue.pop_front() {
                let mut reached: Vec<usize> = segment
                    .iter()
                    .copied()
                    .filter(|&s| !is_placed[s] && self.connected(from, s))
                    .collect();
                reached.sort_by(|&a, &b| self.by_name(a, b));
                for source in reached {
                    trace!(source, from, "placing joined source");
                    is_placed[source] = true;
                    placed.push(source);
                    queue.push_back(source);
                }
            }
            let next = segment
                .iter()
                .copied()
                .filter(|&s| !is_placed[s] && self.has_edges(s))
                .min_by(|&a, &b| self.by_name(a, b));
            match next {
                Some(source) => {
                    trace!(source, "starting a new join component");
                    is_placed[source] = true;
                    placed.push(source);
                    queue.push_back(source);
                }
                None => break,
            }
        }
        for &source in segment {
            if !is_placed[source] {
                trace!(source, "no equality relates source, cross join");
                is_placed[source] = true;
                placed.push(source);
            }
        }
    }

    /// Join criteria per source for a given order: every edge goes to the
    /// endpoint placed later, written with that endpoint on the left.
    pub fn criteria(&self, order: &[usize]) -> Vec<Vec<ExprNode>> {
        let mut rank = vec![0; self.source_nodes.len()];
        for (i, &source) in order.iter().enumerate() {
            rank[source] = i;
        }
        let mut criteria = vec![Vec::new(); self.source_nodes.len()];
        for edge in &self.edges {
            let later = if rank[edge.left_source] > rank[edge.right_source] {
                edge.left_source
            } else {
                edge.right_source
            };
            let criterion = edge.oriented_to(later);
            let list: &mut Vec<ExprNode> = &mut criteria[later];
            if !list.iter().any(|c| c.same_as(&criterion)) {
                list.push(criterion);
            }
        }
        criteria
    }

    /// Columns of other sources known equal to `column` of `source`.
    pub fn equivalents(&self, source: usize, column: &ColumnRef) -> Vec<(usize, ExprNode)> {
        let key = (source, column.name.to_ascii_lowercase());
        let Some(&start) = self.column_nodes.get(&key) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        let mut bfs = Bfs::new(&self.columns, start);
        while let Some(node) = bfs.next(&self.columns) {
            let (other, column) = &self.columns[node];
            if *other != source {
                found.push((*other, column.clone()));
            }
        }
        found.sort_by_key(|(s, _)| *s);
        found
    }
}
