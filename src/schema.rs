use crate::error::{ReportError, ReportResult};
use crate::workbook::Sheet;

pub const START_DATE: &str = "Basisstartterm.";
pub const END_DATE: &str = "BasEindterm.";
pub const ORDER_ID: &str = "Order";
pub const PLANNED_TOTAL: &str = "Gepland totaal";
pub const ACTUAL_TOTAL: &str = "Werk. totaal";
pub const DESCRIPTION: &str = "Korte tekst";

pub const REQUIRED_COLUMNS: [&str; 5] = [START_DATE, END_DATE, ORDER_ID, PLANNED_TOTAL, ACTUAL_TOTAL];

/// 各列在工作表中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub start_date: usize,
    pub end_date: usize,
    pub order_id: usize,
    pub planned_total: usize,
    pub actual_total: usize,
    pub description: Option<usize>,
}

impl ColumnMap {
    fn resolve(sheet: &Sheet) -> Option<Self> {
        Some(Self {
            start_date: sheet.column(START_DATE)?,
            end_date: sheet.column(END_DATE)?,
            order_id: sheet.column(ORDER_ID)?,
            planned_total: sheet.column(PLANNED_TOTAL)?,
            actual_total: sheet.column(ACTUAL_TOTAL)?,
            description: sheet.column(DESCRIPTION),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrderSheet<'a> {
    pub sheet: &'a Sheet,
    pub columns: ColumnMap,
}

/// 按来源顺序返回第一个包含全部必需列的工作表
pub fn locate_order_sheet(sheets: &[Sheet]) -> ReportResult<OrderSheet<'_>> {
    for sheet in sheets {
        if let Some(columns) = ColumnMap::resolve(sheet) {
            tracing::info!(sheet = %sheet.name, rows = sheet.rows.len(), "找到订单工作表");
            return Ok(OrderSheet { sheet, columns });
        }
        tracing::debug!(sheet = %sheet.name, "工作表缺少必需列，跳过");
    }
    Err(ReportError::NoMatchingTable(REQUIRED_COLUMNS.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(name: &str, headers: &[&str]) -> Sheet {
        Sheet::new(name, headers, vec![])
    }

    #[test]
    fn test_picks_first_matching_sheet() {
        let full = [ORDER_ID, START_DATE, END_DATE, PLANNED_TOTAL, ACTUAL_TOTAL];
        let sheets = vec![
            sheet("Toelichting", &["Opmerking"]),
            sheet("Orders", &full),
            sheet("Orders (kopie)", &full),
        ];

        let located = locate_order_sheet(&sheets).unwrap();
        assert_eq!(located.sheet.name, "Orders");
        assert_eq!(located.columns.order_id, 0);
        assert_eq!(located.columns.actual_total, 4);
        assert_eq!(located.columns.description, None);
    }

    #[test]
    fn test_extra_columns_allowed_and_description_found() {
        let sheets = vec![sheet(
            "Blad1",
            &["Extra", START_DATE, END_DATE, ORDER_ID, DESCRIPTION, PLANNED_TOTAL, ACTUAL_TOTAL],
        )];

        let located = locate_order_sheet(&sheets).unwrap();
        assert_eq!(located.columns.description, Some(4));
    }

    #[test]
    fn test_no_matching_sheet() {
        let sheets = vec![
            sheet("Blad1", &[START_DATE, END_DATE, ORDER_ID, PLANNED_TOTAL]),
            sheet("Blad2", &[]),
        ];

        let err = locate_order_sheet(&sheets).unwrap_err();
        assert!(matches!(err, ReportError::NoMatchingTable(_)));
    }

    #[test]
    fn test_empty_workbook() {
        assert!(locate_order_sheet(&[]).is_err());
    }
}
