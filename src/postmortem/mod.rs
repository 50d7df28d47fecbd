//! Postmortem document assembly and persistence.
//!
//! The document is a fixed, ordered list of sections. Each section renders
//! from the shared insight and action list only, never from another
//! section's text, and the table of contents is derived from the same list.

pub mod sections;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::insight::IncidentInsight;
use crate::remediation::RemediationAction;

pub use sections::SectionInput;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create reports directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write postmortem {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmortemSection {
    pub title: String,
    pub content: String,
    pub order: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmortemReport {
    pub incident_id: String,
    pub title: String,
    pub file_path: PathBuf,
    pub sections: Vec<PostmortemSection>,
    pub metadata: BTreeMap<String, String>,
}

impl PostmortemReport {
    /// Full Markdown document: header, table of contents, then sections.
    pub fn to_markdown(&self) -> String {
        let mut doc = format!("# {}\n\n", self.title);
        for (key, value) in &self.metadata {
            doc.push_str(&format!("- **{}:** {}\n", key, value));
        }
        doc.push('\n');
        doc.push_str(&table_of_contents(&self.sections));
        for section in &self.sections {
            doc.push_str(&format!("\n## {}\n\n{}\n", section.title, section.content.trim_end()));
        }
        doc
    }
}

/// GitHub-style heading anchor.
pub fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

pub fn table_of_contents(sections: &[PostmortemSection]) -> String {
    let mut toc = String::from("## Table of Contents\n\n");
    for (i, s) in sections.iter().enumerate() {
        toc.push_str(&format!("{}. [{}](#{})\n", i + 1, s.title, anchor(&s.title)));
    }
    toc
}

/// `{date}-incident-{id}.md`, dated by the alert.
pub fn file_name(insight: &IncidentInsight) -> String {
    let id: String = insight
        .incident_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    format!("{}-incident-{}.md", insight.alert_timestamp.format("%Y-%m-%d"), id)
}

/// Builds postmortems and writes them under a reports directory.
#[derive(Debug, Clone)]
pub struct Assembler {
    reports_dir: PathBuf,
}

impl Assembler {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Render every applicable section in canonical order. No I/O.
    pub fn build(
        &self,
        insight: &IncidentInsight,
        actions: &[RemediationAction],
        resolution_notes: Option<&str>,
        engineer_notes: Option<&str>,
    ) -> PostmortemReport {
        let input = SectionInput {
            insight,
            actions,
            resolution_notes,
            engineer_notes,
        };

        let sections: Vec<PostmortemSection> = sections::CANONICAL
            .iter()
            .filter(|section| section.applies(&input))
            .map(|section| PostmortemSection {
                title: section.title.to_string(),
                content: (section.render)(&input),
                order: section.order,
            })
            .collect();

        let primary = insight
            .primary_cause()
            .map(|c| c.category.display_name())
            .unwrap_or("Unknown Root Cause");

        let metadata = BTreeMap::from([
            ("incident_id".to_string(), insight.incident_id.clone()),
            ("generated_at".to_string(), Utc::now().to_rfc3339()),
            ("primary_cause".to_string(), primary.to_string()),
            ("confidence_score".to_string(), format!("{:.2}", insight.confidence_score)),
            (
                "business_impact".to_string(),
                insight.impact_analysis.business_impact.to_string(),
            ),
            ("sections_count".to_string(), sections.len().to_string()),
            ("action_count".to_string(), actions.len().to_string()),
        ]);

        PostmortemReport {
            incident_id: insight.incident_id.clone(),
            title: format!("Postmortem: {} ({})", primary, insight.incident_id),
            file_path: self.reports_dir.join(file_name(insight)),
            sections,
            metadata,
        }
    }

    /// Build and persist. A write failure is returned to the caller.
    pub fn assemble(
        &self,
        insight: &IncidentInsight,
        actions: &[RemediationAction],
        resolution_notes: Option<&str>,
        engineer_notes: Option<&str>,
    ) -> Result<PostmortemReport, ReportError> {
        let report = self.build(insight, actions, resolution_notes, engineer_notes);
        self.persist(&report)?;
        Ok(report)
    }

    /// Write the report to its `file_path`. The file handle is closed on
    /// every path out of this function.
    pub fn persist(&self, report: &PostmortemReport) -> Result<(), ReportError> {
        fs::create_dir_all(&self.reports_dir).map_err(|source| ReportError::CreateDir {
            path: self.reports_dir.clone(),
            source,
        })?;

        let path = &report.file_path;
        let write_err = |source| ReportError::Write {
            path: path.clone(),
            source,
        };

        let file = File::create(path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(report.to_markdown().as_bytes())
            .map_err(write_err)?;
        let file = writer.into_inner().map_err(|e| write_err(e.into_error()))?;
        file.sync_all().map_err(write_err)?;

        info!(
            incident_id = %report.incident_id,
            path = %path.display(),
            sections = report.sections.len(),
            "Postmortem written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::CauseCategory;
    use crate::insight::synthesize;
    use crate::insight::tests::cause;
    use crate::remediation::plan;
    use crate::telemetry::IncidentContext;
    use chrono::TimeZone;

    fn insight() -> IncidentInsight {
        let ctx = IncidentContext::empty(
            "INC-20240301-ab12cd34",
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
            30,
        );
        synthesize(&ctx, &[cause(CauseCategory::DeploymentRegression, 0.7, &["api"])])
    }

    #[test]
    fn test_nine_sections_without_engineer_notes() {
        let insight = insight();
        let actions = plan(&insight);
        let report = Assembler::new("reports").build(&insight, &actions, None, None);
        let orders: Vec<u8> = report.sections.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6, 7, 8, 10]);
        assert_eq!(report.metadata["sections_count"], "9");
    }

    #[test]
    fn test_ten_sections_with_engineer_notes() {
        let insight = insight();
        let actions = plan(&insight);
        let report = Assembler::new("reports").build(
            &insight,
            &actions,
            Some("Rolled back at 12:50"),
            Some("Pager fired twice"),
        );
        let titles: Vec<&str> = report.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Summary",
                "Timeline",
                "Root Causes",
                "Impact Analysis",
                "Detection",
                "Resolution",
                "Lessons Learned",
                "Action Items",
                "Engineer Notes",
                "Metrics & Monitoring",
            ]
        );
        assert_eq!(report.sections[8].order, 9);
    }

    #[test]
    fn test_toc_matches_body() {
        let insight = insight();
        let actions = plan(&insight);
        let report = Assembler::new("reports").build(&insight, &actions, None, None);
        let doc = report.to_markdown();
        for s in &report.sections {
            assert!(doc.contains(&format!("[{}](#{})", s.title, anchor(&s.title))));
            assert!(doc.contains(&format!("\n## {}\n", s.title)));
        }
        assert!(!doc.contains("Engineer Notes"));
    }

    #[test]
    fn test_anchor() {
        assert_eq!(anchor("Metrics & Monitoring"), "metrics--monitoring");
        assert_eq!(anchor("Root Causes"), "root-causes");
    }

    #[test]
    fn test_file_name_from_alert_date() {
        assert_eq!(file_name(&insight()), "2024-03-01-incident-INC-20240301-ab12cd34.md");
    }

    #[test]
    fn test_assemble_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let reports = dir.path().join("postmortems");
        let insight = insight();
        let actions = plan(&insight);
        let report = Assembler::new(&reports)
            .assemble(&insight, &actions, None, None)
            .unwrap();

        assert_eq!(report.file_path, reports.join("2024-03-01-incident-INC-20240301-ab12cd34.md"));
        let written = std::fs::read_to_string(&report.file_path).unwrap();
        assert_eq!(written, report.to_markdown());
        assert!(written.contains("## Root Causes"));
        assert!(written.contains("Deployment Regression"));
    }

    #[test]
    fn test_assemble_write_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the reports directory should be.
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let insight = insight();
        let err = Assembler::new(&blocker)
            .assemble(&insight, &plan(&insight), None, None)
            .unwrap_err();
        assert!(matches!(err, ReportError::CreateDir { .. }));
    }
}
