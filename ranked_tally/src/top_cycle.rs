//! Smith and Schwartz sets.
//!
//! The candidates are split into strongly connected components of the "defeats" relation
//! (Tarjan, iterative). The top cycle is the union of the components that no other
//! component can reach.

use std::collections::BTreeSet;

use log::debug;

use crate::ballots::CandidateId;
use crate::pairwise::PairwiseGraph;
use crate::parallel::{map_chunks, worker_count};

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum TopCycleKind {
    /// Ties count as edges in both directions.
    Smith,
    /// Only strict defeats count.
    Schwartz,
}

/// Computes top cycles over the candidates of a graph, minus the excluded ones.
#[derive(Debug)]
pub struct TopCycle<'a> {
    graph: &'a PairwiseGraph,
    // Positions in the graph of the candidates taken into account.
    nodes: Vec<usize>,
}

const UNVISITED: usize = usize::MAX;

struct Tarjan<'g> {
    adjacency: &'g [Vec<usize>],
    index: Vec<usize>,
    low_link: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl<'g> Tarjan<'g> {
    fn new(adjacency: &'g [Vec<usize>]) -> Self {
        let n = adjacency.len();
        Tarjan {
            adjacency,
            index: vec![UNVISITED; n],
            low_link: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        }
    }

    fn visit(&mut self, node: usize) {
        self.index[node] = self.next_index;
        self.low_link[node] = self.next_index;
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;
    }

    fn run(mut self) -> Vec<Vec<usize>> {
        for root in 0..self.adjacency.len() {
            if self.index[root] != UNVISITED {
                continue;
            }
            self.visit(root);
            // (node, position of the next edge to follow)
            let mut work: Vec<(usize, usize)> = vec![(root, 0)];
            while let Some(&(node, pos)) = work.last() {
                if let Some(&next) = self.adjacency[node].get(pos) {
                    if let Some(top) = work.last_mut() {
                        top.1 += 1;
                    }
                    if self.index[next] == UNVISITED {
                        self.visit(next);
                        work.push((next, 0));
                    } else if self.on_stack[next] {
                        self.low_link[node] = self.low_link[node].min(self.index[next]);
                    }
                } else {
                    work.pop();
                    if let Some(&(parent, _)) = work.last() {
                        self.low_link[parent] = self.low_link[parent].min(self.low_link[node]);
                    }
                    if self.low_link[node] == self.index[node] {
                        let mut component = Vec::new();
                        while let Some(member) = self.stack.pop() {
                            self.on_stack[member] = false;
                            component.push(member);
                            if member == node {
                                break;
                            }
                        }
                        self.components.push(component);
                    }
                }
            }
        }
        self.components
    }
}

/// The components of a directed graph given by adjacency lists.
fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    Tarjan::new(adjacency).run()
}

/// reach[s][t] is true when component t can be reached from component s by a path of
/// length at least one. Every row is computed independently.
fn reachability(condensed: &[BTreeSet<usize>]) -> Vec<Vec<bool>> {
    let k = condensed.len();
    let sources: Vec<usize> = (0..k).collect();
    let rows = map_chunks(&sources, worker_count(), |chunk| {
        chunk
            .iter()
            .map(|&s| {
                let mut reached = vec![false; k];
                let mut todo: Vec<usize> = condensed[s].iter().copied().collect();
                while let Some(t) = todo.pop() {
                    if !reached[t] {
                        reached[t] = true;
                        todo.extend(condensed[t].iter().copied());
                    }
                }
                reached
            })
            .collect::<Vec<_>>()
    });
    rows.into_iter().flatten().collect()
}

impl<'a> TopCycle<'a> {
    pub fn new(graph: &'a PairwiseGraph, excluded: &BTreeSet<CandidateId>) -> TopCycle<'a> {
        let nodes = graph
            .candidates()
            .iter()
            .enumerate()
            .filter(|(_, cid)| !excluded.contains(cid))
            .map(|(idx, _)| idx)
            .collect();
        TopCycle { graph, nodes }
    }

    pub fn smith_set(&self) -> BTreeSet<CandidateId> {
        self.compute(TopCycleKind::Smith)
    }

    pub fn schwartz_set(&self) -> BTreeSet<CandidateId> {
        self.compute(TopCycleKind::Schwartz)
    }

    fn adjacency(&self, kind: TopCycleKind) -> Vec<Vec<usize>> {
        let n = self.nodes.len();
        let mut adjacency = vec![Vec::new(); n];
        for a in 0..n {
            for b in 0..n {
                if a == b {
                    continue;
                }
                let (for_a, for_b) = self.graph.counts_at(self.nodes[a], self.nodes[b]);
                if for_a > for_b || (kind == TopCycleKind::Smith && for_a == for_b) {
                    adjacency[a].push(b);
                }
            }
        }
        adjacency
    }

    fn to_candidates(&self, members: &[usize]) -> BTreeSet<CandidateId> {
        members
            .iter()
            .map(|m| self.graph.candidates()[self.nodes[*m]])
            .collect()
    }

    /// The strongly connected components of the defeat relation.
    pub fn components(&self, kind: TopCycleKind) -> Vec<BTreeSet<CandidateId>> {
        strongly_connected_components(&self.adjacency(kind))
            .iter()
            .map(|c| self.to_candidates(c))
            .collect()
    }

    pub fn compute(&self, kind: TopCycleKind) -> BTreeSet<CandidateId> {
        if self.nodes.len() <= 1 {
            return self.to_candidates(&(0..self.nodes.len()).collect::<Vec<_>>());
        }
        let adjacency = self.adjacency(kind);
        let components = strongly_connected_components(&adjacency);
        let mut component_of = vec![0; adjacency.len()];
        for (c, members) in components.iter().enumerate() {
            for m in members {
                component_of[*m] = c;
            }
        }
        let mut condensed: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
        for (a, edges) in adjacency.iter().enumerate() {
            for b in edges {
                if component_of[a] != component_of[*b] {
                    condensed[component_of[a]].insert(component_of[*b]);
                }
            }
        }
        let reach = reachability(&condensed);
        let dominating: Vec<usize> = (0..components.len())
            .filter(|t| (0..components.len()).all(|s| s == *t || !reach[s][*t]))
            .collect();
        debug!(
            "top cycle {:?}: {} components, dominating {:?}",
            kind,
            components.len(),
            dominating
        );
        let members: Vec<usize> = dominating
            .iter()
            .flat_map(|c| components[*c].iter().copied())
            .collect();
        self.to_candidates(&members)
    }
}
