use crate::aggregate::Granularity;
use crate::error::ReportResult;
use serde::Deserialize;
use std::path::Path;

/// 报告文档的标题、字号、各节标题与配色
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReportConfig {
    pub document_title: String,
    /// 字号单位为磅，写入 docx 时换算为半磅
    pub title_font_size: usize,
    pub section_font_size: usize,
    pub table_font_size: usize,
    pub period_labels: PeriodLabels,
    pub sections: SectionTitles,
    pub empty_note: String,
    pub fallback_note: String,
    pub bar_width: usize,
    pub fallback_color: String,
    pub negative_color: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PeriodLabels {
    pub week: String,
    pub month: String,
    pub year: String,
}

/// 六个章节的标题，{period} 会被替换为分组粒度名称
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SectionTitles {
    pub order_counts: String,
    pub costs: String,
    pub cumulative: String,
    pub details: String,
    pub imputation: String,
    pub totals: String,
}

impl ReportConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ReportConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_default() -> ReportResult<Self> {
        Ok(serde_json::from_str(include_str!("../config/report_config.json"))?)
    }

    pub fn period_label(&self, granularity: Granularity) -> &str {
        match granularity {
            Granularity::Week => &self.period_labels.week,
            Granularity::Month => &self.period_labels.month,
            Granularity::Year => &self.period_labels.year,
        }
    }

    pub fn section_title(&self, template: &str, granularity: Granularity) -> String {
        template.replace("{period}", self.period_label(granularity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_parses() {
        let config = ReportConfig::load_default().unwrap();
        assert_eq!(config.period_label(Granularity::Month), "Maand");
        assert_eq!(
            config.section_title(&config.sections.order_counts, Granularity::Year),
            "Aantal Orders per Jaar"
        );
    }

    #[test]
    fn test_load_from_file_roundtrips_default() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", include_str!("../config/report_config.json")).unwrap();

        let loaded = ReportConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded, ReportConfig::load_default().unwrap());
    }

    #[test]
    fn test_load_from_file_rejects_bad_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{{\"document_title\": 3}}").unwrap();

        let result = ReportConfig::load_from_file(temp_file.path());
        assert!(matches!(result, Err(ReportError::Config(_))));
    }
}
