//! 订单分析：读取 Excel 订单表，清洗、按周/月/年汇总成本，并导出 Word 报告。

pub mod aggregate;
pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod table;
pub mod workbook;

pub use aggregate::{DateRange, Granularity, PeriodKey};
pub use config::ReportConfig;
pub use error::{ReportError, ReportResult};
pub use pipeline::{run, OrderReport, ReportRequest};
pub use report::{render_report, write_report};
pub use workbook::{ensure_xlsx, read_workbook, read_workbook_bytes, Sheet};
