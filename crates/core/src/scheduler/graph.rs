//! Step dependency graph.

use crate::error::EngineError;
use ledit_protocol::StepSpec;
use std::collections::HashMap;

/// Directed graph over step ids, built once per run and validated before any
/// step executes.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    order: Vec<String>,
    index: HashMap<String, usize>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl DependencyGraph {
    /// Build the graph for `steps`.
    ///
    /// # Errors
    ///
    /// - `DuplicateStep` if two steps share an id
    /// - `UnknownReference` if a step depends on an id that is not a step
    /// - `DependencyCycle` if the dependencies form a cycle (including a step
    ///   depending on itself)
    pub fn build(steps: &[StepSpec]) -> Result<Self, EngineError> {
        let mut index = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            if index.insert(step.id.clone(), position).is_some() {
                return Err(EngineError::DuplicateStep(step.id.clone()));
            }
        }

        let mut dependencies = vec![Vec::new(); steps.len()];
        let mut dependents = vec![Vec::new(); steps.len()];
        for (position, step) in steps.iter().enumerate() {
            for reference in &step.depends_on {
                let Some(&target) = index.get(reference) else {
                    return Err(EngineError::UnknownReference {
                        step_id: step.id.clone(),
                        reference: reference.clone(),
                    });
                };
                if !dependencies[position].contains(&target) {
                    dependencies[position].push(target);
                    dependents[target].push(position);
                }
            }
        }

        let graph = Self {
            order: steps.iter().map(|step| step.id.clone()).collect(),
            index,
            dependencies,
            dependents,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    fn check_acyclic(&self) -> Result<(), EngineError> {
        let mut marks = vec![Mark::Unvisited; self.order.len()];
        let mut path = Vec::new();

        for start in 0..self.order.len() {
            if marks[start] == Mark::Unvisited {
                self.visit(start, &mut marks, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit(
        &self,
        node: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Result<(), EngineError> {
        marks[node] = Mark::InProgress;
        path.push(node);

        for &next in &self.dependencies[node] {
            match marks[next] {
                Mark::Done => {}
                Mark::InProgress => {
                    let start = path.iter().position(|&n| n == next).unwrap_or(0);
                    let mut steps: Vec<String> =
                        path[start..].iter().map(|&n| self.order[n].clone()).collect();
                    steps.push(self.order[next].clone());
                    return Err(EngineError::DependencyCycle { steps });
                }
                Mark::Unvisited => self.visit(next, marks, path)?,
            }
        }

        path.pop();
        marks[node] = Mark::Done;
        Ok(())
    }

    /// Declaration index of a step.
    pub fn position(&self, step_id: &str) -> Option<usize> {
        self.index.get(step_id).copied()
    }

    /// Direct dependencies of a step.
    pub fn dependencies(&self, step_id: &str) -> Vec<&str> {
        self.position(step_id)
            .map(|position| {
                self.dependencies[position]
                    .iter()
                    .map(|&n| self.order[n].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every step that depends on `step_id`, directly or through other
    /// steps, in declaration order.
    pub fn transitive_dependents(&self, step_id: &str) -> Vec<&str> {
        let Some(start) = self.position(step_id) else {
            return Vec::new();
        };

        let mut seen = vec![false; self.order.len()];
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &dependent in &self.dependents[node] {
                if !seen[dependent] {
                    seen[dependent] = true;
                    stack.push(dependent);
                }
            }
        }

        seen.iter()
            .enumerate()
            .filter(|&(_, &reached)| reached)
            .map(|(n, _)| self.order[n].as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledit_protocol::StepStatus;

    fn step(id: &str, deps: &[&str]) -> StepSpec {
        StepSpec {
            id: id.to_string(),
            name: String::new(),
            description: String::new(),
            agent_id: "a".to_string(),
            input: Default::default(),
            expected_output: String::new(),
            status: StepStatus::Pending,
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            timeout: None,
            retries: None,
        }
    }

    #[test]
    fn test_build_valid_graph() {
        let graph = DependencyGraph::build(&[
            step("design", &[]),
            step("api", &["design"]),
            step("ui", &["design"]),
            step("qa", &["api", "ui"]),
        ])
        .unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.position("ui"), Some(2));
        assert_eq!(graph.dependencies("qa"), vec!["api", "ui"]);
        assert_eq!(graph.transitive_dependents("design"), vec!["api", "ui", "qa"]);
        assert_eq!(graph.transitive_dependents("api"), vec!["qa"]);
        assert!(graph.transitive_dependents("qa").is_empty());
    }

    #[test]
    fn test_duplicate_step() {
        let err = DependencyGraph::build(&[step("a", &[]), step("a", &[])]).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateStep(id) if id == "a"));
    }

    #[test]
    fn test_unknown_reference() {
        let err = DependencyGraph::build(&[step("a", &["ghost"])]).unwrap_err();
        match err {
            EngineError::UnknownReference { step_id, reference } => {
                assert_eq!(step_id, "a");
                assert_eq!(reference, "ghost");
            }
            other => panic!("expected UnknownReference, got {other:?}"),
        }
    }

    #[test]
    fn test_cycles() {
        let err = DependencyGraph::build(&[step("a", &["a"])]).unwrap_err();
        assert!(matches!(err, EngineError::DependencyCycle { .. }));

        let err = DependencyGraph::build(&[
            step("a", &["c"]),
            step("b", &["a"]),
            step("c", &["b"]),
        ])
        .unwrap_err();
        match err {
            EngineError::DependencyCycle { steps } => {
                assert_eq!(steps.first(), steps.last());
                assert_eq!(steps.len(), 4);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
