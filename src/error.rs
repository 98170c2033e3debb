// 订单分析 - 错误类型
// 单元格级别的解析失败不在此列：它们落为 None / ParsedNumber::Unparseable

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("没有工作表包含所需列: {0}")]
    NoMatchingTable(String),

    #[error("清洗后没有任何有效的开始日期")]
    EmptyDateRange,

    #[error("日期范围无效: {start} 晚于 {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("文件格式不支持: {0}（仅支持 .xlsx）")]
    UnsupportedFormat(String),

    #[error("Excel 解析失败: {0}")]
    Workbook(String),

    #[error("报告生成失败: {0}")]
    Render(String),

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error("文件读写失败: {0}")]
    Io(#[from] std::io::Error),
}

impl From<calamine::XlsxError> for ReportError {
    fn from(err: calamine::XlsxError) -> Self {
        ReportError::Workbook(err.to_string())
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Config(err.to_string())
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
