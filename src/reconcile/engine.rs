use crate::assess::{Assessment, AssessmentMode, Assessor};
use crate::store::{ExpectationStore, OriginatorPattern, Resolution};
use crate::{GatewatchError, Result};
use chrono::Utc;
use tracing::{debug, error, info, warn};

/// Mode flags for one reconciliation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// May create records for untracked targets.
    pub allow_add: bool,
    /// May overwrite a stored expectation when drift is observed.
    pub allow_freshen: bool,
}

/// What happened to one target.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetOutcome {
    /// New record created with the observed originator.
    Created { originator: String },
    /// Expectation matched while persisting; timestamp refreshed.
    Confirmed,
    /// Drift observed in an update-permitting run; expectation overwritten.
    Updated { previous: String, observed: String },
    /// Expectation matched in a read-only run; nothing touched.
    Verified { originator: String },
    /// Per-target failure; the run continues with the remaining targets.
    Failed { reason: String },
}

impl TargetOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TargetOutcome::Failed { .. })
    }
}

/// Aggregated result of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Per-target outcomes in processing order, keyed by store key.
    pub outcomes: Vec<(String, TargetOutcome)>,
    /// Whether any record changed, i.e. whether the store needs writing.
    pub changed: bool,
}

impl RunReport {
    pub fn failed(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| outcome.is_failure())
    }
}

/// Drives the per-target decision process over a borrowed store and
/// assessment collaborator.
pub struct Reconciler<'a, A: Assessor> {
    store: &'a mut ExpectationStore,
    assessor: &'a A,
    options: ReconcileOptions,
}

impl<'a, A: Assessor> Reconciler<'a, A> {
    pub fn new(store: &'a mut ExpectationStore, assessor: &'a A, options: ReconcileOptions) -> Self {
        Self {
            store,
            assessor,
            options,
        }
    }

    /// Reconcile the given targets, or every tracked path when the list is
    /// empty. A single target's failure never aborts the batch; only the
    /// fatal conditions (explicit target missing, broken collaborator
    /// contract, corrupt store data) do.
    pub fn run(&mut self, targets: &[String]) -> Result<RunReport> {
        let explicit = !targets.is_empty();
        let worklist: Vec<String> = if explicit {
            targets.to_vec()
        } else {
            self.store.keys().cloned().collect()
        };

        let mut report = RunReport::default();
        for target in &worklist {
            if let Some((key, outcome)) = self.reconcile_target(target, explicit, &mut report)? {
                report.outcomes.push((key, outcome));
            }
        }
        Ok(report)
    }

    fn reconcile_target(
        &mut self,
        target: &str,
        explicit: bool,
        report: &mut RunReport,
    ) -> Result<Option<(String, TargetOutcome)>> {
        let Resolution { usable_path, key } = self.store.resolve(target)?;

        if !usable_path.exists() {
            if explicit {
                // The user asked for this path by name.
                return Err(GatewatchError::MissingTarget(usable_path));
            }
            // A tracked path may legitimately disappear (app uninstalled).
            debug!("Skipping {key}: tracked path no longer exists");
            return Ok(None);
        }

        let is_new = !self.store.contains_key(&key);
        if is_new && !self.options.allow_add {
            error!("{key}: not tracked, and adding is disabled");
            return Ok(Some((
                key,
                TargetOutcome::Failed {
                    reason: "not tracked, and adding is disabled".to_string(),
                },
            )));
        }

        let mut record = self.store.get(&key).cloned().unwrap_or_default();
        let will_persist = is_new || self.options.allow_freshen;

        let mode = record
            .assessment_type
            .unwrap_or_else(|| AssessmentMode::infer(&usable_path));
        let assessment = self.assessor.assess(&usable_path, mode);

        if !assessment.accepted() {
            error!(
                "{key}: assessment failed (status {}): {}",
                assessment.status, assessment.diagnostics
            );
            return Ok(Some((
                key,
                TargetOutcome::Failed {
                    reason: failure_reason(&assessment),
                },
            )));
        }

        let observed = assessment
            .originator()
            .ok_or_else(|| GatewatchError::MissingOriginator {
                path: usable_path.clone(),
            })?
            .to_string();

        // No stored pattern counts as changed: there is nothing to confirm
        // against.
        let matched = match &record.originator {
            Some(pattern) => pattern.matches(&observed)?,
            None => false,
        };
        let previous = record
            .originator
            .as_ref()
            .map(|pattern| pattern.to_string())
            .unwrap_or_else(|| "(none)".to_string());

        let outcome = if is_new {
            let pattern = OriginatorPattern::canonicalize(&observed);
            info!("{key}: created with originator {pattern}");
            record.originator = Some(pattern.clone());
            TargetOutcome::Created {
                originator: pattern.to_string(),
            }
        } else if will_persist {
            if matched {
                info!("{key}: no change");
                TargetOutcome::Confirmed
            } else {
                warn!("{key}: originator changing from {previous} to {observed}");
                record.originator = Some(OriginatorPattern::canonicalize(&observed));
                TargetOutcome::Updated { previous, observed }
            }
        } else if matched {
            info!("{key}: verified ({previous})");
            TargetOutcome::Verified {
                originator: previous,
            }
        } else {
            error!("{key}: originator changed from {previous} to {observed}");
            TargetOutcome::Failed {
                reason: format!("originator changed from {previous} to {observed}"),
            }
        };

        if will_persist {
            record.last_updated = Some(Utc::now());
            self.store.insert(key.clone(), record);
            report.changed = true;
        }

        Ok(Some((key, outcome)))
    }
}

fn failure_reason(assessment: &Assessment) -> String {
    if assessment.diagnostics.is_empty() {
        format!("assessment failed (status {})", assessment.status)
    } else {
        format!(
            "assessment failed (status {}): {}",
            assessment.status, assessment.diagnostics
        )
    }
}
