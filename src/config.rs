use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Row positions of an LMS completion export.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    pub header_row: usize,
    pub due_date_row: usize,
    pub first_data_row: usize,
    pub header_scan_rows: usize,
    pub min_rows: usize,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            header_row: 0,
            due_date_row: 2,
            first_data_row: 3,
            header_scan_rows: 4,
            min_rows: 4,
        }
    }
}

/// Header keywords, matched against normalized header text.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnRules {
    pub student_labels: Vec<String>,
    pub summary_labels: Vec<String>,
    pub excluded_labels: Vec<String>,
    pub default_assessment_start: usize,
}

impl Default for ColumnRules {
    fn default() -> Self {
        Self {
            student_labels: to_strings(&["اسم", "الطالب", "student", "name"]),
            summary_labels: to_strings(&["overall", "إجمالي", "المجموع"]),
            excluded_labels: to_strings(&["unnamed", "notes", "ملاحظات"]),
            default_assessment_start: 7,
        }
    }
}

/// How a non-empty cell that is neither numeric nor a special token counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrayTextPolicy {
    #[default]
    Submitted,
    NotSubmitted,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub layout: SheetLayout,
    pub columns: ColumnRules,
    pub stray_text: StrayTextPolicy,
}

impl AnalysisConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("invalid analysis config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw)
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            stray_text = "not_submitted"

            [layout]
            due_date_row = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.stray_text, StrayTextPolicy::NotSubmitted);
        assert_eq!(config.layout.due_date_row, 1);
        assert_eq!(config.layout.first_data_row, 3);
        assert_eq!(config.columns.default_assessment_start, 7);
        assert!(config.columns.summary_labels.contains(&"overall".to_string()));
    }

    #[test]
    fn empty_config_is_default() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config.stray_text, StrayTextPolicy::Submitted);
        assert_eq!(config.layout.header_row, 0);
    }
}
