//! Self-Healer: periodic diagnosis loop with policy-driven recovery
//!
//! Each cycle runs every registered [`SelfHealingPair`]: diagnosis first,
//! then recovery when the pair's policy decides the component has been
//! degraded for long enough. A summary of the latest cycle is shared through
//! [`SelfHealer::summary_handle`].

use crate::reliability::{CycleOutcome, SelfHealingPair};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default interval between cycles
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest interval accepted; anything below is raised to this
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Aggregated results, updated after every cycle
#[derive(Debug, Clone, Default)]
pub struct HealerSummary {
    /// Outcomes of the most recent cycle
    pub outcomes: Vec<CycleOutcome>,
    pub check_cycles: u64,
    pub total_recoveries: u64,
    pub total_errors: u64,
}

impl HealerSummary {
    /// Components whose last diagnosis failed
    pub fn degraded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.diagnosis_passed)
            .map(|o| o.component.as_str())
            .collect()
    }
}

pub struct SelfHealer {
    pairs: Vec<SelfHealingPair>,
    interval: Duration,
    max_cycles: Option<u64>,
    summary: Arc<RwLock<HealerSummary>>,
}

impl SelfHealer {
    pub fn new(pairs: Vec<SelfHealingPair>, interval: Duration) -> Self {
        Self {
            pairs,
            interval: interval.max(MIN_INTERVAL),
            max_cycles: None,
            summary: Arc::new(RwLock::new(HealerSummary::default())),
        }
    }

    /// Stop on its own after `cycles` cycles.
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn summary_handle(&self) -> Arc<RwLock<HealerSummary>> {
        self.summary.clone()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Run until `cancel` fires or the cycle cap is reached.
    ///
    /// The first cycle runs one full interval after start.
    pub async fn run(mut self, cancel: CancellationToken) -> HealerSummary {
        info!(
            components = self.pairs.len(),
            interval = ?self.interval,
            "Self-healer started"
        );

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Self-healer cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let summary = self.run_cycle().await;
                    if self.max_cycles.is_some_and(|max| summary.check_cycles >= max) {
                        info!(cycles = summary.check_cycles, "Self-healer reached cycle limit");
                        break;
                    }
                }
            }
        }

        self.summary.read().await.clone()
    }

    /// Run one cycle over every pair and publish the summary.
    pub async fn run_cycle(&mut self) -> HealerSummary {
        let mut outcomes = Vec::with_capacity(self.pairs.len());
        let mut recoveries = 0u64;
        let mut errors = 0u64;

        for pair in &mut self.pairs {
            match pair.run_cycle() {
                Ok(outcome) => {
                    if outcome.recovered {
                        info!(component = %outcome.component, "Recovery performed");
                        recoveries += 1;
                    } else if !outcome.diagnosis_passed {
                        warn!(
                            component = %outcome.component,
                            consecutive = pair.policy().consecutive_degraded(),
                            "Component degraded"
                        );
                    } else {
                        debug!(component = %outcome.component, "Component healthy");
                    }
                    if !outcome.dependencies_healthy {
                        warn!(component = %outcome.component, "Component has unhealthy dependencies");
                    }
                    outcomes.push(outcome);
                }
                Err(e) => {
                    error!(component = %pair.component_id(), error = %e, "Self-healing cycle failed");
                    errors += 1;
                }
            }
        }

        let mut summary = self.summary.write().await;
        summary.outcomes = outcomes;
        summary.check_cycles += 1;
        summary.total_recoveries += recoveries;
        summary.total_errors += errors;
        debug!(
            cycle = summary.check_cycles,
            recoveries,
            errors,
            "Self-healer cycle complete"
        );
        summary.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
