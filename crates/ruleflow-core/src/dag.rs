//! Pipeline dependency analysis
//!
//! Builds the step dependency graph from `depends_on` declarations, rejects
//! unknown dependencies and cycles, and computes a deterministic topological
//! order (ties broken by declaration order).

use crate::ast::PipelineStep;
use crate::error::{CoreError, Result};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Validated dependency graph over a pipeline's steps.
///
/// Steps are addressed by their declaration index.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl DependencyGraph {
    /// Build and validate the graph
    pub fn build(steps: &[PipelineStep]) -> Result<Self> {
        if steps.is_empty() {
            return Err(CoreError::EmptyPipeline);
        }

        let mut index = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if index.insert(step.name.clone(), i).is_some() {
                return Err(CoreError::DuplicateStep(step.name.clone()));
            }
        }

        let mut dependencies = vec![Vec::new(); steps.len()];
        let mut dependents = vec![Vec::new(); steps.len()];
        for (i, step) in steps.iter().enumerate() {
            for dep in &step.depends_on {
                let Some(&d) = index.get(dep) else {
                    return Err(CoreError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                if !dependencies[i].contains(&d) {
                    dependencies[i].push(d);
                    dependents[d].push(i);
                }
            }
        }

        let names: Vec<String> = steps.iter().map(|s| s.name.clone()).collect();
        check_cycles(&names, &dependencies)?;
        let order = topological_order(&dependencies, &dependents);

        Ok(DependencyGraph {
            names,
            index,
            dependencies,
            dependents,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, step: usize) -> &str {
        &self.names[step]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Direct dependencies of a step
    pub fn dependencies(&self, step: usize) -> &[usize] {
        &self.dependencies[step]
    }

    /// Steps that directly depend on a step
    pub fn dependents(&self, step: usize) -> &[usize] {
        &self.dependents[step]
    }

    /// Topological order, ties broken by declaration order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn ordered_names(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.names[i].as_str()).collect()
    }
}

/// DFS colouring; a gray node reached again closes a cycle
fn check_cycles(names: &[String], dependencies: &[Vec<usize>]) -> Result<()> {
    fn dfs(
        node: usize,
        dependencies: &[Vec<usize>],
        colors: &mut [Color],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        colors[node] = Color::Gray;
        path.push(node);

        for &dep in &dependencies[node] {
            match colors[dep] {
                Color::Gray => {
                    let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = dfs(dep, dependencies, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        colors[node] = Color::Black;
        None
    }

    let mut colors = vec![Color::White; names.len()];
    for start in 0..names.len() {
        if colors[start] != Color::White {
            continue;
        }
        let mut path = Vec::new();
        if let Some(cycle) = dfs(start, dependencies, &mut colors, &mut path) {
            return Err(CoreError::CyclicDependency {
                path: cycle.into_iter().map(|i| names[i].clone()).collect(),
            });
        }
    }
    Ok(())
}

/// Kahn's algorithm with a min-heap on declaration index
fn topological_order(dependencies: &[Vec<usize>], dependents: &[Vec<usize>]) -> Vec<usize> {
    let mut remaining: Vec<usize> = dependencies.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = remaining
        .iter()
        .enumerate()
        .filter(|(_, &count)| count == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(dependencies.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &next in &dependents[node] {
            remaining[next] -= 1;
            if remaining[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }
    order
}
