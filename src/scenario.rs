use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, bail};
use invcache_matrix::Matrix;
use serde::{Deserialize, Serialize};

use crate::metrics::CacheMetricsSnapshot;
use crate::registry::SlotId;
use crate::solve::{CacheSolver, Lookup};

/// A named sequence of slot operations, usually loaded from YAML:
///
/// ```yaml
/// steps:
///   - op: create
///     name: a
///     matrix: [[4, 7], [2, 6]]
///   - op: solve
///     name: a
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Step {
    Create {
        name: String,
        #[serde(default)]
        matrix: Option<Matrix>,
    },
    Set {
        name: String,
        matrix: Matrix,
    },
    Solve {
        name: String,
    },
}

impl Step {
    pub fn name(&self) -> &str {
        match self {
            Self::Create { name, .. } | Self::Set { name, .. } | Self::Solve { name } => name,
        }
    }
}

impl Scenario {
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        serde_yaml::from_str(source).context("failed to parse scenario")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open scenario {}", path.display()))?;
        serde_yaml::from_reader(file)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum StepOutcome {
    Created { slot: SlotId },
    Set { slot: SlotId },
    Solved { slot: SlotId, lookup: Lookup, inverse: Matrix },
    Failed { slot: SlotId, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub name: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub steps: Vec<StepReport>,
    pub metrics: CacheMetricsSnapshot,
}

/// Replays `scenario` against `solver`.
///
/// Solve failures are recorded in the report and replay continues; a step
/// that names an undeclared slot, or redeclares one, aborts the run.
pub fn run_scenario(solver: &CacheSolver, scenario: &Scenario) -> Result<ScenarioReport> {
    let mut slots: HashMap<String, SlotId> = HashMap::new();
    let mut steps = Vec::with_capacity(scenario.steps.len());

    for (index, step) in scenario.steps.iter().enumerate() {
        let outcome = match step {
            Step::Create { name, matrix } => {
                if slots.contains_key(name) {
                    bail!("step {index}: slot `{name}` is already defined");
                }
                let slot = solver.create_slot(matrix.clone());
                slots.insert(name.clone(), slot);
                StepOutcome::Created { slot }
            }
            Step::Set { name, matrix } => {
                let slot = lookup_slot(&slots, index, name)?;
                solver
                    .set_matrix(slot, matrix.clone())
                    .with_context(|| format!("step {index}: failed to set `{name}`"))?;
                StepOutcome::Set { slot }
            }
            Step::Solve { name } => {
                let slot = lookup_slot(&slots, index, name)?;
                match solver.solve_outcome(slot) {
                    Ok(solved) => StepOutcome::Solved {
                        slot,
                        lookup: solved.lookup,
                        inverse: solved.inverse,
                    },
                    Err(err) => StepOutcome::Failed {
                        slot,
                        error: err.to_string(),
                    },
                }
            }
        };
        steps.push(StepReport {
            index,
            name: step.name().to_string(),
            outcome,
        });
    }

    Ok(ScenarioReport {
        steps,
        metrics: solver.registry().metrics().snapshot(),
    })
}

fn lookup_slot(slots: &HashMap<String, SlotId>, index: usize, name: &str) -> Result<SlotId> {
    match slots.get(name) {
        Some(slot) => Ok(*slot),
        None => bail!("step {index}: slot `{name}` was never created"),
    }
}
