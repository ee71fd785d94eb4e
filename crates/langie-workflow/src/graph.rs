use std::collections::HashMap;

use langie_config::BranchPolicy;

use crate::error::WorkflowError;
use crate::record::Route;
use crate::stage::Stage;

/// The stage graph the executor walks.
///
/// The graph is linear except for DECIDE. With [`BranchPolicy::TraverseAll`]
/// DECIDE has a single successor and all three downstream branches run in
/// sequence; with [`BranchPolicy::RouteOnly`] DECIDE fans out and the decided
/// [`Route`] selects exactly one branch, which then joins at COMPLETE.
#[derive(Debug, Clone)]
pub struct StageGraph {
  /// Adjacency list: stage -> downstream stages.
  adjacency: HashMap<Stage, Vec<Stage>>,
}

const TRUNK: [Stage; 7] = [
  Stage::Intake,
  Stage::Understand,
  Stage::Prepare,
  Stage::Ask,
  Stage::Wait,
  Stage::Retrieve,
  Stage::Decide,
];

const BRANCHES: [Stage; 3] = [Stage::EscalateUpdate, Stage::Generate, Stage::Act];

impl StageGraph {
  /// Build the graph for the given branch policy.
  pub fn new(policy: BranchPolicy) -> Self {
    let mut edges: Vec<(Stage, Stage)> = TRUNK.windows(2).map(|w| (w[0], w[1])).collect();

    match policy {
      BranchPolicy::TraverseAll => {
        edges.push((Stage::Decide, BRANCHES[0]));
        edges.extend(BRANCHES.windows(2).map(|w| (w[0], w[1])));
        edges.push((BRANCHES[2], Stage::Complete));
      }
      BranchPolicy::RouteOnly => {
        for branch in BRANCHES {
          edges.push((Stage::Decide, branch));
          edges.push((branch, Stage::Complete));
        }
      }
    }

    let mut adjacency: HashMap<Stage, Vec<Stage>> = HashMap::new();
    for stage in Stage::ALL {
      adjacency.entry(stage).or_default();
    }
    for (from, to) in edges {
      adjacency.entry(from).or_default().push(to);
    }

    Self { adjacency }
  }

  /// The first stage of every run.
  pub fn entry_point(&self) -> Stage {
    Stage::Intake
  }

  /// Get downstream stages for a given stage.
  pub fn downstream(&self, stage: Stage) -> &[Stage] {
    self
      .adjacency
      .get(&stage)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Resolve the stage that follows `stage`.
  ///
  /// Returns `Ok(None)` once the terminal stage has run. At a branch point the
  /// route decides which successor is taken.
  pub fn next(&self, stage: Stage, route: Option<Route>) -> Result<Option<Stage>, WorkflowError> {
    match self.downstream(stage) {
      [] => Ok(None),
      [only] => Ok(Some(*only)),
      candidates => {
        let route = route.ok_or(WorkflowError::MissingRoute { stage })?;
        let target = route.branch_stage();
        if candidates.contains(&target) {
          Ok(Some(target))
        } else {
          Err(WorkflowError::InvalidTransition {
            from: stage,
            to: target,
          })
        }
      }
    }
  }

  /// Walk the graph from `from` to the end, following `route` at the branch
  /// point. Used for planning and display; the executor resolves one step at
  /// a time because the route is only known after DECIDE.
  pub fn path_from(&self, from: Stage, route: Option<Route>) -> Result<Vec<Stage>, WorkflowError> {
    let mut path = vec![from];
    let mut current = from;
    while let Some(next) = self.next(current, route)? {
      path.push(next);
      current = next;
    }
    Ok(path)
  }
}
