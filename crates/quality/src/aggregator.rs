//! Verdict aggregation.
//!
//! The aggregator observes a run's per-check verdicts along two independent
//! paths:
//!
//! 1. **Direct** - the `CheckResult`s handed over by the fan-in of all check
//!    executors. This path is authoritative for `TotalPass`.
//! 2. **Store** - the run record as the summary store currently holds it. It
//!    is only compared against the direct path and reported; it never changes
//!    the computed verdict, so store read lag cannot affect correctness.
//!
//! Checks that never reported count as failed.

use std::collections::HashMap;
use std::sync::Arc;

use qcflow_core::{total_verdict, Attribute, CheckResult, RunRecord, StatusCode, Verdict};
use qcflow_storage::{StoreError, SummaryStore};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{QcError, Result};
use crate::registry::CheckRegistry;

/// How the store path compared to the direct path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StoreObservation {
    /// Store holds the same per-check verdicts
    Agreed,
    /// Store disagrees on at least one check
    Diverged {
        /// Per-check disagreements
        divergences: Vec<Divergence>,
    },
    /// Store holds no record for the run
    Missing,
    /// Store could not be read
    Unavailable {
        /// Status of the failed read
        status: StatusCode,
    },
}

/// One check on which the two paths disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Divergence {
    /// Check attribute
    pub attribute: String,
    /// Verdict from the direct path
    pub direct: Verdict,
    /// Verdict the store holds
    pub stored: Verdict,
}

/// Output of one aggregation.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Direct-path record with `TotalPass` and the write's status code
    pub record: RunRecord,

    /// Cross-check against the store
    pub observation: StoreObservation,
}

/// Computes and persists the total verdict of a run.
#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<CheckRegistry>,
    store: Arc<dyn SummaryStore>,
}

impl Aggregator {
    /// Create an aggregator expecting the checks in `registry`.
    pub fn new(registry: Arc<CheckRegistry>, store: Arc<dyn SummaryStore>) -> Self {
        Self { registry, store }
    }

    /// Aggregate the fan-in of one run.
    ///
    /// The run identity is taken from the first result. Results for another
    /// run or for unconfigured checks are ignored.
    pub async fn aggregate(&self, results: &[CheckResult]) -> Result<Aggregation> {
        let first = results
            .first()
            .ok_or_else(|| QcError::InvalidInput("no check results to aggregate".to_string()))?;
        let run = RunRecord::new(
            first.group_id.clone(),
            first.stream_id.clone(),
            first.start_time,
            first.qc_pid,
        );
        Ok(self.aggregate_run(&run, results).await)
    }

    /// Aggregate the fan-in of a run whose identity is already known.
    ///
    /// An empty fan-in is valid here: every expected check counts as failed.
    pub async fn aggregate_run(&self, run: &RunRecord, results: &[CheckResult]) -> Aggregation {
        let direct = self.direct_record(run, results);
        let key = direct.key();

        let observation = self.observe_store(&direct).await;
        match &observation {
            StoreObservation::Agreed => debug!(run = %key, "Store agrees with check results"),
            StoreObservation::Diverged { divergences } => {
                for d in divergences {
                    warn!(
                        run = %key,
                        attribute = %d.attribute,
                        direct = %d.direct,
                        stored = %d.stored,
                        "Store diverges from check result"
                    );
                }
            }
            StoreObservation::Missing => warn!(run = %key, "Run missing from store"),
            StoreObservation::Unavailable { status } => {
                warn!(run = %key, %status, "Store unavailable for cross-check")
            }
        }

        let total = total_verdict(self.registry.attributes(), &direct.checks);

        let status = match self
            .store
            .update_attribute(&key, &Attribute::TotalPass, total)
            .await
        {
            Ok(status) => {
                info!(run = %key, total_pass = %total, "Recorded total verdict");
                status
            }
            Err(e) => {
                warn!(run = %key, "Failed to record total verdict: {}", e);
                e.status_code()
            }
        };

        let mut record = direct;
        record.total_pass = total;
        Aggregation {
            record: record.with_status(status),
            observation,
        }
    }

    /// Shell carrying the run identity with every expected check failed,
    /// overlaid with the reported verdicts.
    fn direct_record(&self, run: &RunRecord, results: &[CheckResult]) -> RunRecord {
        let key = run.key();
        let mut record = self.baseline(run);
        let mut reported: HashMap<String, Verdict> = HashMap::new();

        for result in results {
            if result.key() != key || result.qc_pid != run.qc_pid {
                warn!(
                    run = %key,
                    check = %result.check_name,
                    other = %result.key(),
                    "Ignoring result from another run"
                );
                continue;
            }
            let Some(check) = self.registry.get(&result.check_name) else {
                warn!(run = %key, check = %result.check_name, "Ignoring result from unknown check");
                continue;
            };
            reported
                .entry(check.spec.attribute.clone())
                .and_modify(|v| *v = v.merge(result.pass))
                .or_insert(result.pass);
        }

        for (attribute, verdict) in reported {
            record.checks.insert(attribute, verdict);
        }
        record
    }

    fn baseline(&self, run: &RunRecord) -> RunRecord {
        let mut record = RunRecord::new(
            run.group_id.clone(),
            run.stream_id.clone(),
            run.start_time,
            run.qc_pid,
        );
        for attribute in self.registry.attributes() {
            record.checks.insert(attribute.to_string(), Verdict::Fail);
        }
        record
    }

    async fn observe_store(&self, direct: &RunRecord) -> StoreObservation {
        let stored = match self.store.fetch(&direct.key()).await {
            Ok(Some(stored)) => stored,
            Ok(None) | Err(StoreError::KeyNotFound(_)) => return StoreObservation::Missing,
            Err(e) => {
                return StoreObservation::Unavailable {
                    status: e.status_code(),
                }
            }
        };

        let divergences: Vec<Divergence> = self
            .registry
            .attributes()
            .filter_map(|attribute| {
                let direct = direct.checks.get(attribute).copied().unwrap_or_default();
                let stored = stored.checks.get(attribute).copied().unwrap_or_default();
                (direct != stored).then(|| Divergence {
                    attribute: attribute.to_string(),
                    direct,
                    stored,
                })
            })
            .collect();

        if divergences.is_empty() {
            StoreObservation::Agreed
        } else {
            StoreObservation::Diverged { divergences }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::StaticEvaluator;
    use crate::test_support::DownStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use qcflow_core::{CheckSpec, QcPid, RunKey};
    use qcflow_storage::MemoryStore;

    const CHECKS: [(&str, &str); 3] = [
        ("QCProcess1", "Process1Pass"),
        ("QCProcess2", "Process2Pass"),
        ("QCProcess3", "Process3Pass"),
    ];

    fn registry() -> Arc<CheckRegistry> {
        let mut registry = CheckRegistry::new();
        for (name, attr) in CHECKS {
            registry
                .register(CheckSpec::new(name, attr), Arc::new(StaticEvaluator::passing()))
                .unwrap();
        }
        Arc::new(registry)
    }

    fn run() -> RunRecord {
        RunRecord::new("G1", "S1", Utc::now(), QcPid::new())
    }

    fn result(run: &RunRecord, name: &str, pass: Verdict) -> CheckResult {
        CheckResult {
            check_name: name.to_string(),
            group_id: run.group_id.clone(),
            start_time: run.start_time,
            stream_id: run.stream_id.clone(),
            qc_pid: run.qc_pid,
            pass,
            status_code: Some(StatusCode::OK),
        }
    }

    fn results(run: &RunRecord, verdicts: [Verdict; 3]) -> Vec<CheckResult> {
        CHECKS
            .iter()
            .zip(verdicts)
            .map(|((name, _), v)| result(run, name, v))
            .collect()
    }

    /// Store whose reads always return a fixed (possibly stale) view.
    struct StaleStore {
        view: Option<RunRecord>,
        inner: MemoryStore,
    }

    #[async_trait]
    impl SummaryStore for StaleStore {
        async fn create(&self, record: &RunRecord) -> qcflow_storage::Result<StatusCode> {
            self.inner.create(record).await
        }
        async fn fetch(&self, _key: &RunKey) -> qcflow_storage::Result<Option<RunRecord>> {
            Ok(self.view.clone())
        }
        async fn update_attribute(
            &self,
            key: &RunKey,
            attribute: &Attribute,
            value: Verdict,
        ) -> qcflow_storage::Result<StatusCode> {
            self.inner.update_attribute(key, attribute, value).await
        }
    }

    #[tokio::test]
    async fn test_all_pass() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = Aggregator::new(registry(), store.clone());
        let run = run();

        let out = aggregator
            .aggregate(&results(&run, [Verdict::Pass; 3]))
            .await
            .unwrap();

        assert_eq!(out.record.total_pass, Verdict::Pass);
        assert_eq!(out.record.status_code, Some(StatusCode::OK));
        assert_eq!(out.record.qc_pid, run.qc_pid);
        assert_eq!(out.record.checks.len(), 3);
    }

    #[tokio::test]
    async fn test_one_fail() {
        let aggregator = Aggregator::new(registry(), Arc::new(MemoryStore::new()));
        let run = run();

        let out = aggregator
            .aggregate(&results(&run, [Verdict::Pass, Verdict::Fail, Verdict::Pass]))
            .await
            .unwrap();

        assert_eq!(out.record.total_pass, Verdict::Fail);
        assert_eq!(out.record.checks["Process2Pass"], Verdict::Fail);
    }

    #[tokio::test]
    async fn test_every_combination() {
        let verdicts = [Verdict::Unknown, Verdict::Pass, Verdict::Fail];
        let aggregator = Aggregator::new(registry(), Arc::new(MemoryStore::new()));
        for a in verdicts {
            for b in verdicts {
                for c in verdicts {
                    let run = run();
                    let out = aggregator.aggregate(&results(&run, [a, b, c])).await.unwrap();
                    let all_pass = a.is_pass() && b.is_pass() && c.is_pass();
                    assert_eq!(
                        out.record.total_pass,
                        Verdict::from_passed(all_pass),
                        "{a} {b} {c}"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_missing_check_fails() {
        let aggregator = Aggregator::new(registry(), Arc::new(MemoryStore::new()));
        let run = run();
        let partial = vec![
            result(&run, "QCProcess1", Verdict::Pass),
            result(&run, "QCProcess3", Verdict::Pass),
        ];

        let out = aggregator.aggregate(&partial).await.unwrap();
        assert_eq!(out.record.total_pass, Verdict::Fail);
        assert_eq!(out.record.checks["Process2Pass"], Verdict::Fail);
    }

    #[tokio::test]
    async fn test_empty_fan_in_rejected() {
        let aggregator = Aggregator::new(registry(), Arc::new(MemoryStore::new()));
        assert!(matches!(
            aggregator.aggregate(&[]).await,
            Err(QcError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_known_run_with_no_results_fails() {
        let store = Arc::new(MemoryStore::new());
        let run = run();
        store.create(&run).await.unwrap();
        let aggregator = Aggregator::new(registry(), store.clone());

        let out = aggregator.aggregate_run(&run, &[]).await;

        assert_eq!(out.record.key(), run.key());
        assert_eq!(out.record.qc_pid, run.qc_pid);
        assert_eq!(out.record.total_pass, Verdict::Fail);
        assert!(out.record.checks.values().all(|v| *v == Verdict::Fail));
        let stored = store.get(&run.key()).await.unwrap();
        assert_eq!(stored.total_pass, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_total_pass_persisted() {
        let store = Arc::new(MemoryStore::new());
        let run = run();
        store.create(&run).await.unwrap();
        let aggregator = Aggregator::new(registry(), store.clone());

        aggregator
            .aggregate(&results(&run, [Verdict::Pass; 3]))
            .await
            .unwrap();

        let stored = store.get(&run.key()).await.unwrap();
        assert_eq!(stored.total_pass, Verdict::Pass);
    }

    #[tokio::test]
    async fn test_stale_store_does_not_change_verdict() {
        let run = run();
        let mut stale = run.clone();
        stale.checks.insert("Process1Pass".into(), Verdict::Pass);
        stale.checks.insert("Process2Pass".into(), Verdict::Fail);

        let store = Arc::new(StaleStore {
            view: Some(stale),
            inner: MemoryStore::new(),
        });
        let aggregator = Aggregator::new(registry(), store);

        let out = aggregator
            .aggregate(&results(&run, [Verdict::Pass; 3]))
            .await
            .unwrap();

        assert_eq!(out.record.total_pass, Verdict::Pass);
        let StoreObservation::Diverged { divergences } = &out.observation else {
            panic!("expected divergence, got {:?}", out.observation);
        };
        assert_eq!(divergences.len(), 2);
        assert_eq!(divergences[0].attribute, "Process2Pass");
        assert_eq!(divergences[0].stored, Verdict::Fail);
        assert_eq!(divergences[1].attribute, "Process3Pass");
        assert_eq!(divergences[1].stored, Verdict::Unknown);
    }

    #[tokio::test]
    async fn test_stale_pass_cannot_rescue_failure() {
        let run = run();
        let mut stale = run.clone();
        for (_, attr) in CHECKS {
            stale.checks.insert(attr.into(), Verdict::Pass);
        }
        let store = Arc::new(StaleStore {
            view: Some(stale),
            inner: MemoryStore::new(),
        });
        let aggregator = Aggregator::new(registry(), store);

        let out = aggregator
            .aggregate(&results(&run, [Verdict::Pass, Verdict::Pass, Verdict::Fail]))
            .await
            .unwrap();
        assert_eq!(out.record.total_pass, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_absent_store_record() {
        let store = Arc::new(StaleStore {
            view: None,
            inner: MemoryStore::new(),
        });
        let aggregator = Aggregator::new(registry(), store);
        let run = run();

        let out = aggregator
            .aggregate(&results(&run, [Verdict::Pass; 3]))
            .await
            .unwrap();
        assert_eq!(out.record.total_pass, Verdict::Pass);
        assert_eq!(out.observation, StoreObservation::Missing);
    }

    #[tokio::test]
    async fn test_store_agrees() {
        let store = Arc::new(MemoryStore::new());
        let run = run();
        store.create(&run).await.unwrap();
        for (_, attr) in CHECKS {
            store
                .update_attribute(&run.key(), &Attribute::Check(attr.into()), Verdict::Pass)
                .await
                .unwrap();
        }
        let aggregator = Aggregator::new(registry(), store);

        let out = aggregator
            .aggregate(&results(&run, [Verdict::Pass; 3]))
            .await
            .unwrap();
        assert_eq!(out.observation, StoreObservation::Agreed);
    }

    #[tokio::test]
    async fn test_store_down_still_computes() {
        let aggregator = Aggregator::new(registry(), Arc::new(DownStore));
        let run = run();

        let out = aggregator
            .aggregate(&results(&run, [Verdict::Pass; 3]))
            .await
            .unwrap();

        assert_eq!(out.record.total_pass, Verdict::Pass);
        assert_eq!(out.record.status_code, Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(
            out.observation,
            StoreObservation::Unavailable {
                status: StatusCode::SERVICE_UNAVAILABLE
            }
        );
    }

    #[tokio::test]
    async fn test_foreign_and_unknown_results_ignored() {
        let aggregator = Aggregator::new(registry(), Arc::new(MemoryStore::new()));
        let run = run();
        let other = RunRecord::new("G2", "S1", run.start_time, QcPid::new());

        let mut fan_in = results(&run, [Verdict::Pass; 3]);
        fan_in.push(result(&other, "QCProcess1", Verdict::Fail));
        fan_in.push(result(&run, "QCProcess9", Verdict::Fail));

        let out = aggregator.aggregate(&fan_in).await.unwrap();
        assert_eq!(out.record.total_pass, Verdict::Pass);
        assert_eq!(out.record.checks.len(), 3);
        assert_eq!(out.record.group_id, "G1");
    }

    #[tokio::test]
    async fn test_duplicate_report_failure_wins() {
        let aggregator = Aggregator::new(registry(), Arc::new(MemoryStore::new()));
        let run = run();

        let mut fan_in = results(&run, [Verdict::Pass; 3]);
        fan_in.push(result(&run, "QCProcess3", Verdict::Fail));
        fan_in.push(result(&run, "QCProcess3", Verdict::Pass));

        let out = aggregator.aggregate(&fan_in).await.unwrap();
        assert_eq!(out.record.checks["Process3Pass"], Verdict::Fail);
        assert_eq!(out.record.total_pass, Verdict::Fail);
    }
}
