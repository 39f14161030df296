use std::collections::BTreeMap;

/// One poll result from the external build/deploy status feed (`GET
/// /v1/state`), mirroring `original_source/pkg/skaffold/status_probe.go`'s
/// parsed response shape.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeployStatus {
    /// The deploy phase name reported by the feed (e.g. `"Complete"`).
    pub deploy: String,
    /// The overall status-check phase reported by the feed (e.g.
    /// `"Succeeded"`).
    pub status_check: String,
    /// Per-artifact status-check phase, keyed by artifact image name. Purely
    /// informational (surfaced over the debug API); readiness is derived
    /// from `deploy`/`status_check` only, matching the original's top-level
    /// `deployState`/`statusCheckState` rule.
    pub artifacts: BTreeMap<String, String>,
    /// `true` iff `deploy == "Complete"` and `status_check == "Succeeded"`.
    /// Computed by the probe, not the feed.
    pub ready: bool,
    /// Set when the probe could not reach the feed at all (a transport
    /// error), as opposed to the feed answering with a not-yet-ready state.
    pub unreachable: bool,
}

impl DeployStatus {
    /// Build the status the probe reports before its first successful poll.
    pub fn not_ready() -> Self {
        Self::default()
    }

    /// Build the status the probe reports when the feed is unreachable.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Compute `ready` from `deploy` and `status_check`, matching the
    /// original's `ready = (deployState == Complete) && (statusCheckState ==
    /// Succeeded)` rule.
    pub fn recompute_ready(&mut self) {
        self.ready =
            !self.unreachable && self.deploy == "Complete" && self.status_check == "Succeeded";
    }
}
