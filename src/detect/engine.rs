use crate::detect::detectors::default_detectors;
use crate::detect::{Detector, RootCause, MAX_CONFIDENCE};
use crate::telemetry::IncidentContext;
use std::cmp::Ordering;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Runs every detector over a context and ranks what they find.
pub struct InferenceEngine {
    detectors: Vec<Box<dyn Detector>>,
    confidence_threshold: f64,
}

impl InferenceEngine {
    pub fn new(confidence_threshold: f64) -> Self {
        Self::with_detectors(default_detectors(), confidence_threshold)
    }

    pub fn with_detectors(detectors: Vec<Box<dyn Detector>>, confidence_threshold: f64) -> Self {
        Self {
            detectors,
            confidence_threshold,
        }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Ranked causes: confidence descending, ties in detector order, and
    /// nothing at or below the configured threshold.
    pub fn analyze(&self, ctx: &IncidentContext) -> Vec<RootCause> {
        let mut causes: Vec<RootCause> = self
            .detectors
            .iter()
            .filter_map(|d| run_detector(d.as_ref(), ctx))
            .collect();

        // Vec::sort_by is stable, so equal scores keep detector order.
        causes.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));
        causes.retain(|c| c.confidence > self.confidence_threshold);

        info!(
            incident_id = %ctx.incident_id,
            causes = causes.len(),
            primary = causes.first().map(|c| c.category.as_str()).unwrap_or("none"),
            "Root cause analysis complete"
        );
        causes
    }
}

/// A detector error or panic is treated as "no evidence".
fn run_detector(detector: &dyn Detector, ctx: &IncidentContext) -> Option<RootCause> {
    let category = detector.category();
    match catch_unwind(AssertUnwindSafe(|| detector.detect(ctx))) {
        Ok(Ok(Some(mut cause))) => {
            cause.confidence = cause.confidence.min(MAX_CONFIDENCE);
            debug!(category = %category, confidence = cause.confidence, "Detector emitted candidate");
            Some(cause)
        }
        Ok(Ok(None)) => {
            debug!(category = %category, "Detector found no evidence");
            None
        }
        Ok(Err(e)) => {
            warn!(category = %category, error = %e, "Detector failed, treating as no evidence");
            None
        }
        Err(_) => {
            warn!(category = %category, "Detector panicked, treating as no evidence");
            None
        }
    }
}
