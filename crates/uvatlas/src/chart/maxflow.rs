//! Boykov–Kolmogorov augmenting-path max-flow.
//!
//! Two search trees grow from the source and the sink over residual arcs.
//! When their frontiers touch, the connecting path is augmented by its
//! bottleneck; nodes whose parent arc saturates become orphans and are
//! re-adopted into a tree or freed. The algorithm completes when no active
//! node remains; the final source side is the minimum cut.

/// Node handle inside a [`FlowNetwork`].
pub type NodeId = usize;

const NONE: usize = usize::MAX;
/// Parent marker for tree roots (connected straight to a terminal).
const TERMINAL: usize = usize::MAX - 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Tree {
    Free,
    Source,
    Sink,
}

#[derive(Clone, Debug)]
struct Node {
    /// Residual capacity to the source (positive) or sink (negative).
    terminal_cap: f64,
    first_arc: usize,
    /// The flow-carrying arc of the tree link: parent→node in the source
    /// tree, node→parent in the sink tree.
    parent_arc: usize,
    tree: Tree,
}

#[derive(Clone, Debug)]
struct Arc {
    head: usize,
    next: usize,
    residual: f64,
}

/// A directed flow network with terminal capacities per node.
#[derive(Clone, Debug, Default)]
pub struct FlowNetwork {
    nodes: Vec<Node>,
    arcs: Vec<Arc>,
    flow: f64,
}

impl FlowNetwork {
    pub fn new(node_count: usize) -> Self {
        Self {
            nodes: vec![
                Node {
                    terminal_cap: 0.0,
                    first_arc: NONE,
                    parent_arc: NONE,
                    tree: Tree::Free,
                };
                node_count
            ],
            arcs: Vec::new(),
            flow: 0.0,
        }
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a pair of antiparallel arcs between `a` and `b`.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, cap: f64, rev_cap: f64) {
        debug_assert!(a != b && a < self.nodes.len() && b < self.nodes.len());
        let fwd = self.arcs.len();
        self.arcs.push(Arc {
            head: b,
            next: self.nodes[a].first_arc,
            residual: cap,
        });
        self.nodes[a].first_arc = fwd;
        let rev = self.arcs.len();
        self.arcs.push(Arc {
            head: a,
            next: self.nodes[b].first_arc,
            residual: rev_cap,
        });
        self.nodes[b].first_arc = rev;
    }

    /// Accumulate terminal capacities; source and sink demand cancel.
    pub fn set_terminal(&mut self, node: NodeId, source_cap: f64, sink_cap: f64) {
        self.nodes[node].terminal_cap += source_cap - sink_cap;
    }

    /// Run the augmenting-path search to completion; returns the max flow.
    pub fn max_flow(&mut self) -> f64 {
        let n = self.nodes.len();
        let mut active: std::collections::VecDeque<usize> = std::collections::VecDeque::new();
        for i in 0..n {
            let cap = self.nodes[i].terminal_cap;
            if cap > 0.0 {
                self.nodes[i].tree = Tree::Source;
                self.nodes[i].parent_arc = TERMINAL;
                active.push_back(i);
            } else if cap < 0.0 {
                self.nodes[i].tree = Tree::Sink;
                self.nodes[i].parent_arc = TERMINAL;
                active.push_back(i);
            }
        }

        let mut orphans: Vec<usize> = Vec::new();
        while let Some(p) = active.pop_front() {
            if self.nodes[p].tree == Tree::Free {
                continue;
            }
            // Growth: scan residual arcs out of the frontier node.
            let mut a = self.nodes[p].first_arc;
            while a != NONE {
                let next = self.arcs[a].next;
                let q = self.arcs[a].head;
                let residual = match self.nodes[p].tree {
                    Tree::Source => self.arcs[a].residual,
                    Tree::Sink => self.arcs[a ^ 1].residual,
                    Tree::Free => unreachable!(),
                };
                if residual > 0.0 {
                    match self.nodes[q].tree {
                        Tree::Free => {
                            self.nodes[q].tree = self.nodes[p].tree;
                            self.nodes[q].parent_arc = match self.nodes[p].tree {
                                Tree::Source => a,
                                _ => a ^ 1,
                            };
                            active.push_back(q);
                        }
                        tree if tree != self.nodes[p].tree => {
                            // The trees touched: augment through arc `a`.
                            let bridge = match self.nodes[p].tree {
                                Tree::Source => a,
                                _ => a ^ 1,
                            };
                            self.augment(bridge, &mut orphans);
                            self.adopt(&mut orphans, &mut active);
                            if self.nodes[p].tree == Tree::Free {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                a = next;
            }
            if self.nodes[p].tree != Tree::Free {
                // Re-queue while the node still borders a free node or the
                // opposite tree through residual capacity; every such visit
                // either grows the tree or pushes strictly positive flow, so
                // the loop terminates.
                let mut has_work = false;
                let mut a = self.nodes[p].first_arc;
                while a != NONE {
                    let q = self.arcs[a].head;
                    let residual = match self.nodes[p].tree {
                        Tree::Source => self.arcs[a].residual,
                        _ => self.arcs[a ^ 1].residual,
                    };
                    if residual > 0.0 && self.nodes[q].tree != self.nodes[p].tree {
                        has_work = true;
                        break;
                    }
                    a = self.arcs[a].next;
                }
                if has_work {
                    active.push_back(p);
                }
            }
        }
        self.flow
    }

    /// True when the node ended on the source side of the cut.
    #[inline]
    pub fn in_source_side(&self, node: NodeId) -> bool {
        self.nodes[node].tree == Tree::Source
    }

    /// Push the bottleneck along source-root → `bridge` → sink-root.
    fn augment(&mut self, bridge: usize, orphans: &mut Vec<usize>) {
        // 1. Bottleneck over the bridge arc and both tree paths.
        let mut bottleneck = self.arcs[bridge].residual;
        let mut v = self.arcs[bridge ^ 1].head; // tail of bridge (source side)
        loop {
            let pa = self.nodes[v].parent_arc;
            if pa == TERMINAL {
                bottleneck = bottleneck.min(self.nodes[v].terminal_cap);
                break;
            }
            bottleneck = bottleneck.min(self.arcs[pa].residual);
            v = self.arcs[pa ^ 1].head;
        }
        let mut v = self.arcs[bridge].head; // head of bridge (sink side)
        loop {
            let pa = self.nodes[v].parent_arc;
            if pa == TERMINAL {
                bottleneck = bottleneck.min(-self.nodes[v].terminal_cap);
                break;
            }
            bottleneck = bottleneck.min(self.arcs[pa].residual);
            v = self.arcs[pa].head;
        }

        // 2. Push the flow; saturated parent arcs orphan their child.
        self.arcs[bridge].residual -= bottleneck;
        self.arcs[bridge ^ 1].residual += bottleneck;
        let mut v = self.arcs[bridge ^ 1].head;
        loop {
            let pa = self.nodes[v].parent_arc;
            if pa == TERMINAL {
                self.nodes[v].terminal_cap -= bottleneck;
                if self.nodes[v].terminal_cap <= 0.0 {
                    self.nodes[v].parent_arc = NONE;
                    orphans.push(v);
                }
                break;
            }
            self.arcs[pa].residual -= bottleneck;
            self.arcs[pa ^ 1].residual += bottleneck;
            let parent = self.arcs[pa ^ 1].head;
            if self.arcs[pa].residual <= 0.0 {
                self.nodes[v].parent_arc = NONE;
                orphans.push(v);
            }
            v = parent;
        }
        let mut v = self.arcs[bridge].head;
        loop {
            let pa = self.nodes[v].parent_arc;
            if pa == TERMINAL {
                self.nodes[v].terminal_cap += bottleneck;
                if -self.nodes[v].terminal_cap <= 0.0 {
                    self.nodes[v].parent_arc = NONE;
                    orphans.push(v);
                }
                break;
            }
            self.arcs[pa].residual -= bottleneck;
            self.arcs[pa ^ 1].residual += bottleneck;
            let parent = self.arcs[pa].head;
            if self.arcs[pa].residual <= 0.0 {
                self.nodes[v].parent_arc = NONE;
                orphans.push(v);
            }
            v = parent;
        }
        self.flow += bottleneck;
    }

    /// Walk parent arcs to check the node is still rooted at a terminal.
    fn has_root(&self, mut v: usize, tree: Tree) -> bool {
        let mut hops = 0;
        loop {
            let pa = self.nodes[v].parent_arc;
            if pa == TERMINAL {
                return true;
            }
            if pa == NONE {
                return false;
            }
            v = match tree {
                Tree::Source => self.arcs[pa ^ 1].head,
                _ => self.arcs[pa].head,
            };
            hops += 1;
            if hops > self.nodes.len() {
                return false;
            }
        }
    }

    /// Re-attach orphans to their tree through a residual arc from a rooted
    /// neighbor, or free them (freeing may orphan their children).
    fn adopt(
        &mut self,
        orphans: &mut Vec<usize>,
        active: &mut std::collections::VecDeque<usize>,
    ) {
        while let Some(v) = orphans.pop() {
            let tree = self.nodes[v].tree;
            if tree == Tree::Free {
                continue;
            }
            // Look for a rooted same-tree neighbor with residual capacity
            // toward the orphan.
            let mut found = NONE;
            let mut a = self.nodes[v].first_arc;
            while a != NONE {
                let q = self.arcs[a].head;
                if self.nodes[q].tree == tree {
                    let toward_v = match tree {
                        Tree::Source => self.arcs[a ^ 1].residual,
                        _ => self.arcs[a].residual,
                    };
                    if toward_v > 0.0 && self.has_root(q, tree) {
                        found = a;
                        break;
                    }
                }
                a = self.arcs[a].next;
            }
            if found != NONE {
                self.nodes[v].parent_arc = match tree {
                    Tree::Source => found ^ 1,
                    _ => found,
                };
            } else {
                // Free the orphan; children become orphans, same-tree
                // neighbors become active again.
                self.nodes[v].tree = Tree::Free;
                self.nodes[v].parent_arc = NONE;
                let mut a = self.nodes[v].first_arc;
                while a != NONE {
                    let q = self.arcs[a].head;
                    if self.nodes[q].tree == tree {
                        let child_pa = self.nodes[q].parent_arc;
                        if child_pa != NONE && child_pa != TERMINAL {
                            let parent_of_q = match tree {
                                Tree::Source => self.arcs[child_pa ^ 1].head,
                                _ => self.arcs[child_pa].head,
                            };
                            if parent_of_q == v {
                                self.nodes[q].parent_arc = NONE;
                                orphans.push(q);
                            }
                        }
                        active.push_back(q);
                    }
                    a = self.arcs[a].next;
                }
            }
        }
    }
}
