//! Blast-radius estimation.

use std::collections::BTreeSet;

use super::{BusinessImpact, ImpactAnalysis};
use crate::detect::{CauseCategory, RootCause};
use crate::telemetry::IncidentContext;

const ENDPOINT_KEYS: &[&str] = &["endpoint", "path", "route", "handler", "http.route"];

/// User-impact fraction and estimated users for the primary cause.
pub fn user_impact(primary: Option<CauseCategory>) -> (f64, u64) {
    match primary {
        Some(CauseCategory::InfrastructureDegradation) => (0.9, 1200),
        Some(CauseCategory::DatabaseIssues) => (0.8, 1000),
        Some(CauseCategory::DeploymentRegression) => (0.6, 750),
        Some(CauseCategory::DependencyFailure) => (0.4, 500),
        _ => (0.3, 300),
    }
}

pub fn analyze(ctx: &IncidentContext, causes: &[RootCause]) -> ImpactAnalysis {
    let mut services: BTreeSet<String> = BTreeSet::new();
    let mut endpoints: BTreeSet<String> = BTreeSet::new();

    for cause in causes {
        services.extend(cause.affected_services.iter().cloned());
    }
    for m in &ctx.metrics_anomalies {
        if let Some(svc) = m.labels.get("service") {
            services.insert(svc.clone());
        }
        endpoints.extend(
            ENDPOINT_KEYS
                .iter()
                .filter_map(|k| m.labels.get(*k))
                .cloned(),
        );
    }
    for t in &ctx.trace_outliers {
        services.insert(t.service_name.clone());
        endpoints.extend(ENDPOINT_KEYS.iter().filter_map(|k| t.tags.get(*k)).cloned());
    }
    for l in &ctx.log_signatures {
        services.insert(l.service.clone());
    }
    services.retain(|s| !s.is_empty());
    endpoints.retain(|e| !e.is_empty());

    let (fraction, users) = user_impact(causes.first().map(|c| c.category));

    ImpactAnalysis {
        affected_services: services.into_iter().collect(),
        affected_endpoints: endpoints.into_iter().collect(),
        user_impact_percentage: fraction,
        estimated_users_affected: users,
        sla_breach_duration_minutes: ctx.time_window_minutes,
        business_impact: BusinessImpact::from_fraction(fraction),
    }
}
