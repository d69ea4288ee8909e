use std::collections::{BTreeSet, HashMap, VecDeque};

use super::DependencyError;
use crate::survey::domain::{Question, QuestionId};

#[derive(Debug, Clone)]
struct Node {
    id: QuestionId,
    position: u32,
    parents: Vec<usize>,
    children: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Directed parent -> child graph over the live questions of one survey.
///
/// Nodes live in an arena indexed by insertion order; edges are index lists so
/// traversals never chase question ids through the map more than once.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    index: HashMap<QuestionId, usize>,
}

impl DependencyGraph {
    /// Builds the graph and rejects unknown parents and cycles.
    pub fn build(questions: &[Question]) -> Result<Self, DependencyError> {
        let mut graph = Self::default();

        for question in questions.iter().filter(|question| !question.deleted) {
            graph.index.insert(question.id, graph.nodes.len());
            graph.nodes.push(Node {
                id: question.id,
                position: question.position,
                parents: Vec::new(),
                children: Vec::new(),
            });
        }

        for question in questions.iter().filter(|question| !question.deleted) {
            let child = graph.index[&question.id];
            for dependency in &question.dependencies {
                let parent = *graph.index.get(&dependency.parent).ok_or(
                    DependencyError::UnknownParent {
                        child: question.id,
                        parent: dependency.parent,
                    },
                )?;
                if !graph.nodes[child].parents.contains(&parent) {
                    graph.nodes[child].parents.push(parent);
                    graph.nodes[parent].children.push(child);
                }
            }
        }

        graph.detect_cycle()?;
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: QuestionId) -> bool {
        self.index.contains_key(&id)
    }

    /// Every dependency must point at a question positioned earlier than its child.
    pub fn ensure_parents_precede(&self) -> Result<(), DependencyError> {
        for node in &self.nodes {
            for &parent in &node.parents {
                if self.nodes[parent].position >= node.position {
                    return Err(DependencyError::ParentNotEarlier {
                        child: node.id,
                        parent: self.nodes[parent].id,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn parents(&self, id: QuestionId) -> Result<Vec<QuestionId>, DependencyError> {
        let node = self.node(id)?;
        Ok(self.sorted_ids(self.nodes[node].parents.iter().copied()))
    }

    pub fn direct_children(&self, id: QuestionId) -> Result<Vec<QuestionId>, DependencyError> {
        let node = self.node(id)?;
        Ok(self.sorted_ids(self.nodes[node].children.iter().copied()))
    }

    /// Transitive children, ordered by position.
    pub fn descendants(&self, id: QuestionId) -> Result<Vec<QuestionId>, DependencyError> {
        let start = self.node(id)?;
        Ok(self.sorted_ids(self.reach(start, |node| &node.children)))
    }

    /// Transitive parents, ordered by position.
    pub fn ancestors(&self, id: QuestionId) -> Result<Vec<QuestionId>, DependencyError> {
        let start = self.node(id)?;
        Ok(self.sorted_ids(self.reach(start, |node| &node.parents)))
    }

    fn node(&self, id: QuestionId) -> Result<usize, DependencyError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(DependencyError::UnknownQuestion(id))
    }

    fn reach<F>(&self, start: usize, edges: F) -> BTreeSet<usize>
    where
        F: Fn(&Node) -> &Vec<usize>,
    {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<usize> = edges(&self.nodes[start]).iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next) {
                queue.extend(edges(&self.nodes[next]).iter().copied());
            }
        }
        seen
    }

    fn sorted_ids<I>(&self, indexes: I) -> Vec<QuestionId>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut nodes: Vec<&Node> = indexes.into_iter().map(|idx| &self.nodes[idx]).collect();
        nodes.sort_by_key(|node| (node.position, node.id));
        nodes.into_iter().map(|node| node.id).collect()
    }

    /// Depth-first walk that stops as soon as an edge reaches a node still on the current path.
    fn detect_cycle(&self) -> Result<(), DependencyError> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];

        for root in 0..self.nodes.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }

            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            marks[root] = Mark::OnPath;

            while let Some((node, next_edge)) = stack.last().copied() {
                let children = &self.nodes[node].children;
                if next_edge >= children.len() {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                }

                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }

                let child = children[next_edge];
                match marks[child] {
                    Mark::Done => {}
                    Mark::OnPath => {
                        let start = stack
                            .iter()
                            .position(|(idx, _)| *idx == child)
                            .unwrap_or(0);
                        let mut path: Vec<QuestionId> = stack[start..]
                            .iter()
                            .map(|(idx, _)| self.nodes[*idx].id)
                            .collect();
                        path.push(self.nodes[child].id);
                        return Err(DependencyError::Cycle { path });
                    }
                    Mark::Unvisited => {
                        marks[child] = Mark::OnPath;
                        stack.push((child, 0));
                    }
                }
            }
        }

        Ok(())
    }
}
