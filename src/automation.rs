//! Automations: ordered step chains that turn a source into one or more
//! derivatives (spec.md §4.D).
//!
//! An automation always runs its namer first and its sinker last; the steps
//! in between are whatever the config declares. Running an automation against
//! a context produces a primary result and, recursively, the results of every
//! child automation declared by a step along the way.

use crate::error::{Error, Result};
use crate::naming::Namer;
use crate::step::{PipelineContext, RunContext, StepKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::instrument;

/// One named pipeline: a namer plus an ordered list of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    /// Not part of the YAML grammar (spec.md §6 declares no automation
    /// name); assigned after load from the namer's label so logs and error
    /// messages have a stable handle. See `assign_default_names`.
    #[serde(default)]
    pub name: String,
    pub namer: Namer,
    pub steps: Vec<StepKind>,
}

/// Every derivative produced by one `Automation::run`, flattened across the
/// automation's own output and its children's.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub automation: String,
    pub name: String,
}

impl Automation {
    pub fn new(name: impl Into<String>, namer: Namer, steps: Vec<StepKind>) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::config(format!(
                "automation {:?} has zero steps",
                name.into()
            )));
        }
        Ok(Self { name: name.into(), namer, steps })
    }

    /// Runs this automation against `ctx` (spec.md §4.D):
    /// 0. if `ctx.body` is absent, run a `Source` step first — loading the
    ///    *current* `ctx.name`, i.e. before the namer renames it. This is how
    ///    the apply-to-existing pass and the synchronizer re-run an
    ///    automation against a pre-existing source by name alone.
    /// 1. prepend the namer step,
    /// 2. run each declared step in order,
    /// 3. append the sinker step,
    /// 4. after every step, run that step's children against a copy of the
    ///    post-step context.
    #[instrument(skip(self, ctx, rctx), fields(automation = %self.name))]
    pub async fn run(&self, mut ctx: PipelineContext, rctx: &RunContext) -> Result<Vec<RunOutput>> {
        if ctx.body.is_none() {
            ctx = StepKind::Source.execute(ctx, rctx).await?;
        }
        let mut current = StepKind::Namer(self.namer.clone()).execute(ctx, rctx).await?;
        let mut outputs = Vec::new();

        for step in &self.steps {
            current = step.execute(current, rctx).await?;
            for child in step.children() {
                outputs.extend(Box::pin(child.run(current.clone(), rctx)).await?);
            }
        }

        current = StepKind::Sinker.execute(current, rctx).await?;
        outputs.push(RunOutput { automation: self.name.clone(), name: current.name });
        Ok(outputs)
    }

    /// Runs the namer and every step's pure transform without touching
    /// storage, returning the derivative names this automation (and its
    /// descendants) would produce for `source_name`. Used by the
    /// synchronizer to compute the declared set without re-deriving bytes.
    pub fn declared_names(&self, source_name: &str) -> Vec<String> {
        let mut names = vec![self.namer.name(source_name)];
        for step in &self.steps {
            for child in step.children() {
                names.extend(child.declared_names(source_name));
            }
        }
        names
    }

    /// The raw configured target of this automation's own `Resizer` step, if
    /// any. Only top-level steps are considered: a child automation declares
    /// its own size independently under its own name. This is the *target
    /// box*, not the actual output size — the resizer clips it to the
    /// source's aspect ratio (see `expected_size`).
    pub fn declared_size(&self) -> Option<crate::storage::Size> {
        self.steps.iter().find_map(|step| match step {
            StepKind::Resizer { size, .. } => Some(*size),
            _ => None,
        })
    }

    /// The on-disk size this automation's own derivative is expected to have
    /// given a source whose decoded size is `source_size`: the target box
    /// from `declared_size`, clipped to the source's aspect ratio exactly as
    /// the `Resizer` step itself does. Used by the synchronizer so its size
    /// comparison matches the resizer's actual output rather than the raw
    /// target (which only coincides with the output for square targets).
    pub fn expected_size(&self, source_size: crate::storage::Size) -> Option<crate::storage::Size> {
        self.declared_size()
            .map(|target| crate::step::clip_to_box(source_size, target))
    }

    /// All namers reachable from this automation, including itself,
    /// collected for invariant F1 checking at config load.
    pub fn collect_namers<'a>(&'a self, out: &mut Vec<&'a Namer>) {
        out.push(&self.namer);
        for step in &self.steps {
            for child in step.children() {
                child.collect_namers(out);
            }
        }
    }

    /// Names of every automation reachable from this one, including itself.
    /// Used to detect a child automation cycle at config load (spec.md §4.D
    /// edge case: "a child automation cycle is rejected at config load").
    fn collect_names(&self, seen: &mut HashSet<String>) -> Result<()> {
        if !seen.insert(self.name.clone()) {
            return Err(Error::config(format!(
                "automation cycle detected at {:?}",
                self.name
            )));
        }
        for step in &self.steps {
            for child in step.children() {
                child.collect_names(seen)?;
            }
        }
        seen.remove(&self.name);
        Ok(())
    }

    /// Validates this automation has no self-referential child cycle.
    pub fn check_acyclic(&self) -> Result<()> {
        let mut seen = HashSet::new();
        self.collect_names(&mut seen)
    }

    /// Fills in `name` (and every descendant's) from the namer's label where
    /// the config left it blank, disambiguating repeats with a counter.
    pub fn assign_default_names(&mut self, counter: &mut usize) {
        if self.name.is_empty() {
            self.name = format!("{}-{}", self.namer.label(), *counter);
            *counter += 1;
        }
        for step in &mut self.steps {
            for child in step.children_mut() {
                child.assign_default_names(counter);
            }
        }
    }
}

/// Invariant F1: no two automations rooted in the same folder may produce
/// the same name for the same source. Since namers are pure functions of the
/// source name, this reduces to requiring every reachable namer to disagree
/// on at least one input — checked here by requiring distinct `(kind, label)`
/// pairs is too strong (two `Suffix` namers with different suffixes must
/// coexist), so comparison runs on the label string, which already encodes
/// suffix/kind identity.
pub fn check_f1(roots: &[Automation]) -> Result<()> {
    let mut namers = Vec::new();
    for root in roots {
        root.collect_namers(&mut namers);
    }
    let mut labels = HashSet::new();
    for namer in namers {
        let label = namer.label();
        if !labels.insert(label.clone()) {
            return Err(Error::config(format!(
                "invariant F1 violated: namer {label:?} is produced by more than one automation"
            )));
        }
    }
    Ok(())
}
