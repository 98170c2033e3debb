// 工作表 → 定位 → 清洗 → 日期筛选 → 分组汇总 → 展示表格
// 纯函数：结果只取决于 (工作表, 粒度, 日期范围)

use crate::aggregate::{
    aggregate, cumulative_actual, filter_by_date_range, totals, CumulativePoint, DateRange,
    Granularity, PeriodMetrics, Totals,
};
use crate::error::{ReportError, ReportResult};
use crate::normalize::normalize;
use crate::schema::locate_order_sheet;
use crate::table::{
    build_detail_table, build_imputation_summary_table, DetailRow, ImputationRow,
    MISSING_DESCRIPTION,
};
use crate::workbook::Sheet;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportRequest {
    pub granularity: Granularity,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// 交给展示层的全部结果，报告按字段顺序排版
#[derive(Debug, Clone, Serialize)]
pub struct OrderReport {
    pub sheet: String,
    pub granularity: Granularity,
    pub bounds: DateRange,
    pub selected: DateRange,
    pub periods: Vec<PeriodMetrics>,
    pub cumulative: Vec<CumulativePoint>,
    pub totals: Totals,
    pub imputation_summary: Vec<ImputationRow>,
    pub details: Vec<DetailRow>,
}

/// 请求范围与数据范围取交集；交集为空视为无效范围
pub fn select_range(bounds: DateRange, request: &ReportRequest) -> ReportResult<DateRange> {
    if let (Some(from), Some(to)) = (request.from, request.to) {
        if from > to {
            return Err(ReportError::InvalidDateRange { start: from, end: to });
        }
    }
    let start = request.from.map_or(bounds.start, |d| d.max(bounds.start));
    let end = request.to.map_or(bounds.end, |d| d.min(bounds.end));
    DateRange::new(start, end)
}

pub fn run(sheets: &[Sheet], request: &ReportRequest) -> ReportResult<OrderReport> {
    let order_sheet = locate_order_sheet(sheets)?;
    let clean = normalize(&order_sheet)?;
    let bounds = DateRange::spanning(&clean.orders).ok_or(ReportError::EmptyDateRange)?;
    let selected = select_range(bounds, request)?;

    let filtered = filter_by_date_range(&clean.orders, &selected);
    let periods = aggregate(&filtered, request.granularity);
    let cumulative = cumulative_actual(&periods);
    let totals = totals(&periods);

    tracing::info!(
        sheet = %order_sheet.sheet.name,
        granularity = ?request.granularity,
        from = %selected.start,
        to = %selected.end,
        orders = filtered.len(),
        periods = periods.len(),
        "汇总完成"
    );

    Ok(OrderReport {
        sheet: order_sheet.sheet.name.clone(),
        granularity: request.granularity,
        bounds,
        selected,
        periods,
        cumulative,
        totals,
        imputation_summary: build_imputation_summary_table(&clean.imputation),
        details: build_detail_table(&filtered, MISSING_DESCRIPTION),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bounds() -> DateRange {
        DateRange::new(ymd(2024, 1, 1), ymd(2024, 12, 31)).unwrap()
    }

    #[test]
    fn test_select_range_defaults_to_bounds() {
        let selected = select_range(bounds(), &ReportRequest::default()).unwrap();
        assert_eq!(selected, bounds());
    }

    #[test]
    fn test_select_range_clamps_to_bounds() {
        let request = ReportRequest {
            from: Some(ymd(2023, 6, 1)),
            to: Some(ymd(2024, 3, 31)),
            ..Default::default()
        };
        let selected = select_range(bounds(), &request).unwrap();
        assert_eq!(selected.start, ymd(2024, 1, 1));
        assert_eq!(selected.end, ymd(2024, 3, 31));
    }

    #[test]
    fn test_select_range_rejects_inverted_and_disjoint() {
        let inverted = ReportRequest {
            from: Some(ymd(2024, 5, 1)),
            to: Some(ymd(2024, 4, 1)),
            ..Default::default()
        };
        assert!(matches!(
            select_range(bounds(), &inverted),
            Err(ReportError::InvalidDateRange { .. })
        ));

        let disjoint = ReportRequest {
            from: Some(ymd(2025, 2, 1)),
            ..Default::default()
        };
        assert!(select_range(bounds(), &disjoint).is_err());
    }
}
