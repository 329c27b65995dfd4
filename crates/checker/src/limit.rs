//! Limit entity and threshold evaluation.

use serde::{Deserialize, Serialize};

use crate::usage::Usage;

/// How a threshold compares usage against a limit.
///
/// The threshold type is part of configuration, not just its numeric value:
/// a limit can be watched as a percentage of its ceiling or as remaining
/// headroom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// Breach at/above this percentage of the limit.
    Percent(f64),
    /// Breach within this count of the limit.
    Count(u64),
}

impl Threshold {
    /// Whether `value` crosses this threshold against `limit`.
    ///
    /// With no known limit the threshold is an absolute floor on the raw
    /// usage count (used for metrics with no discoverable hard ceiling).
    #[must_use]
    pub fn crossed(self, value: u64, limit: Option<u64>) -> bool {
        match (self, limit) {
            (Self::Percent(pct), Some(limit)) => value as f64 >= (limit as f64) * pct / 100.0,
            (Self::Count(count), Some(limit)) => value >= limit.saturating_sub(count),
            (Self::Percent(pct), None) => value as f64 >= pct,
            (Self::Count(count), None) => value >= count,
        }
    }
}

/// One named, boundable quantity owned by a service.
///
/// Owns the usage collected for it during a run, the provider ceiling (when
/// known), and its threshold configuration. Threshold defaults are captured
/// from the owning service at construction; per-limit overrides take
/// precedence.
#[derive(Debug, Clone, Serialize)]
pub struct Limit {
    name: String,
    service_name: String,
    doc_name: Option<String>,
    resource_type: Option<String>,
    default_limit: Option<u64>,
    limit_override: Option<u64>,
    def_warning_threshold: Threshold,
    def_critical_threshold: Threshold,
    warning_override: Option<Threshold>,
    critical_override: Option<Threshold>,
    usage: Vec<Usage>,
    warnings: Vec<Usage>,
    criticals: Vec<Usage>,
}

impl Limit {
    /// Declare a limit with the service's default thresholds.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        service_name: impl Into<String>,
        default_limit: Option<u64>,
        warning: Threshold,
        critical: Threshold,
    ) -> Self {
        Self {
            name: name.into(),
            service_name: service_name.into(),
            doc_name: None,
            resource_type: None,
            default_limit,
            limit_override: None,
            def_warning_threshold: warning,
            def_critical_threshold: critical,
            warning_override: None,
            critical_override: None,
            usage: Vec::new(),
            warnings: Vec::new(),
            criticals: Vec::new(),
        }
    }

    /// Record the provider-documentation name where it differs from the
    /// canonical name.
    #[must_use]
    pub fn with_doc_name(mut self, doc_name: impl Into<String>) -> Self {
        self.doc_name = Some(doc_name.into());
        self
    }

    /// Tag with the resource-type family this limit bounds.
    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Canonical limit name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning service.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Provider-documentation name, where it differs from the canonical one.
    #[must_use]
    pub fn doc_name(&self) -> Option<&str> {
        self.doc_name.as_deref()
    }

    /// Resource-type family this limit bounds.
    #[must_use]
    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    /// The effective ceiling: an operator override wins over the
    /// provider-known default; `None` when neither is known.
    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.limit_override.or(self.default_limit)
    }

    /// Override the provider ceiling.
    pub fn set_limit_override(&mut self, value: u64) {
        self.limit_override = Some(value);
    }

    /// The warning threshold default captured at construction.
    #[must_use]
    pub fn def_warning_threshold(&self) -> Threshold {
        self.def_warning_threshold
    }

    /// The critical threshold default captured at construction.
    #[must_use]
    pub fn def_critical_threshold(&self) -> Threshold {
        self.def_critical_threshold
    }

    /// Override either threshold for this limit only. `None` keeps the
    /// service-level default for that threshold.
    pub fn override_thresholds(
        &mut self,
        warning: Option<Threshold>,
        critical: Option<Threshold>,
    ) {
        if warning.is_some() {
            self.warning_override = warning;
        }
        if critical.is_some() {
            self.critical_override = critical;
        }
    }

    /// The effective warning threshold.
    #[must_use]
    pub fn warning_threshold(&self) -> Threshold {
        self.warning_override.unwrap_or(self.def_warning_threshold)
    }

    /// The effective critical threshold.
    #[must_use]
    pub fn critical_threshold(&self) -> Threshold {
        self.critical_override.unwrap_or(self.def_critical_threshold)
    }

    /// Attach one collected usage. Called by usage-finders; attachment order
    /// is page/record arrival order.
    pub fn add_current_usage(&mut self, usage: Usage) {
        self.usage.push(usage);
    }

    /// The usage collected this run, in attachment order. Sort before
    /// reporting where determinism matters.
    #[must_use]
    pub fn get_current_usage(&self) -> &[Usage] {
        &self.usage
    }

    /// Drop usage and findings from the previous run.
    pub fn reset_usage(&mut self) {
        self.usage.clear();
        self.warnings.clear();
        self.criticals.clear();
    }

    /// Evaluate every attached usage against the effective thresholds.
    ///
    /// Returns `true` when nothing crossed. Crossed usage is recorded under
    /// [`get_criticals`](Self::get_criticals) /
    /// [`get_warnings`](Self::get_warnings); a usage past the critical
    /// threshold is reported as critical only. No usage means no findings -
    /// absence of resources is never a breach.
    pub fn check_thresholds(&mut self) -> bool {
        self.warnings.clear();
        self.criticals.clear();

        let limit = self.limit();
        let warning = self.warning_threshold();
        let critical = self.critical_threshold();

        for usage in &self.usage {
            if critical.crossed(usage.value(), limit) {
                self.criticals.push(usage.clone());
            } else if warning.crossed(usage.value(), limit) {
                self.warnings.push(usage.clone());
            }
        }

        self.warnings.is_empty() && self.criticals.is_empty()
    }

    /// Usage that crossed the warning threshold in the last evaluation.
    #[must_use]
    pub fn get_warnings(&self) -> &[Usage] {
        &self.warnings
    }

    /// Usage that crossed the critical threshold in the last evaluation.
    #[must_use]
    pub fn get_criticals(&self) -> &[Usage] {
        &self.criticals
    }
}
