// 记录清洗：日期解析、数值转换、按计划金额填补实际金额、剔除无效行并排序
//
// 单元格解析失败不报错，落为 None / Unparseable；
// 只有整张表没有一条有效开始日期时才返回 EmptyDateRange。

use crate::error::{ReportError, ReportResult};
use crate::schema::OrderSheet;
use crate::workbook::cell_text;
use calamine::DataType;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::collections::BTreeMap;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

// 点号、短横线写法按日在前解析；斜杠写法先试月在前，月份越界时再按日在前
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d.%m.%Y", "%d-%m-%Y", "%m/%d/%Y", "%d/%m/%Y"];

// 9999-12-31
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// 数值单元格的解析结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedNumber {
    Number(f64),
    Unparseable,
}

impl ParsedNumber {
    pub fn value(self) -> Option<f64> {
        match self {
            ParsedNumber::Number(v) => Some(v),
            ParsedNumber::Unparseable => None,
        }
    }
}

/// 清洗前的一行，开始日期可能为空
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDateTime>,
    pub order_id: String,
    pub planned_total: ParsedNumber,
    pub actual_total: ParsedNumber,
    /// None 表示工作表没有描述列；列存在但单元格为空时为 Some("")
    pub description: Option<String>,
}

/// 清洗后保留的订单，开始日期必定存在
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDateTime>,
    pub order_id: String,
    pub planned_total: ParsedNumber,
    pub actual_total: ParsedNumber,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CleanTable {
    pub orders: Vec<Order>,
    pub imputation: ImputationMap,
}

// 以 total_cmp 排序的计划金额键，-0.0 与 0.0 视为同一组
#[derive(Debug, Clone, Copy)]
struct PlannedKey(f64);

impl PlannedKey {
    fn new(value: f64) -> Self {
        PlannedKey(if value == 0.0 { 0.0 } else { value })
    }
}

impl PartialEq for PlannedKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PlannedKey {}

impl PartialOrd for PlannedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlannedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// 计划金额 → 非零实际金额的均值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImputationMap {
    means: BTreeMap<PlannedKey, f64>,
}

impl ImputationMap {
    pub fn build(rows: &[OrderRow]) -> Self {
        let mut groups: BTreeMap<PlannedKey, Vec<f64>> = BTreeMap::new();
        for row in rows {
            if let (ParsedNumber::Number(planned), ParsedNumber::Number(actual)) =
                (row.planned_total, row.actual_total)
            {
                if actual != 0.0 {
                    groups.entry(PlannedKey::new(planned)).or_default().push(actual);
                }
            }
        }

        let means = groups
            .into_iter()
            .map(|(key, mut values)| {
                // 排序后再求和，行顺序不影响结果的每一位
                values.sort_by(f64::total_cmp);
                let sum: f64 = values.iter().sum();
                (key, sum / values.len() as f64)
            })
            .collect();
        Self { means }
    }

    pub fn mean_for(&self, planned: f64) -> Option<f64> {
        self.means.get(&PlannedKey::new(planned)).copied()
    }

    /// 按计划金额升序
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.means.iter().map(|(k, v)| (k.0, *v))
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }
}

fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    // 1900 日期系统把 1900-02-29（序号 60）当作存在
    let base = if serial < 60.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let seconds = (serial * 86_400.0).round() as i64;
    base.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::seconds(seconds))
}

fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// 解析日期单元格；数值按 Excel 序列日期处理
pub fn parse_date(cell: &DataType) -> Option<NaiveDateTime> {
    match cell {
        DataType::DateTime(serial) | DataType::Float(serial) => excel_serial_to_datetime(*serial),
        DataType::Int(i) => excel_serial_to_datetime(*i as f64),
        DataType::String(s) => parse_date_text(s),
        DataType::Empty | DataType::Bool(_) | DataType::Error(_) => None,
        other => parse_date_text(&other.to_string()),
    }
}

/// 开始日期只保留到天
pub fn parse_start_date(cell: &DataType) -> Option<NaiveDate> {
    parse_date(cell).map(|dt| dt.date())
}

/// 文本单元格先把小数逗号换成小数点再解析
pub fn coerce_numeric(cell: &DataType) -> ParsedNumber {
    let value = match cell {
        DataType::Float(f) => Some(*f),
        DataType::Int(i) => Some(*i as f64),
        DataType::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(v) if v.is_finite() => ParsedNumber::Number(v),
        _ => ParsedNumber::Unparseable,
    }
}

/// 按列映射把工作表行转换为 OrderRow，短行缺失的单元格按空处理
pub fn read_rows(order_sheet: &OrderSheet<'_>) -> Vec<OrderRow> {
    let cols = order_sheet.columns;
    let empty = DataType::Empty;

    order_sheet
        .sheet
        .rows
        .iter()
        .map(|row| {
            let cell = |i: usize| row.get(i).unwrap_or(&empty);
            OrderRow {
                start_date: parse_start_date(cell(cols.start_date)),
                end_date: parse_date(cell(cols.end_date)),
                order_id: cell_text(cell(cols.order_id)),
                planned_total: coerce_numeric(cell(cols.planned_total)),
                actual_total: coerce_numeric(cell(cols.actual_total)),
                description: cols.description.map(|i| cell_text(cell(i))),
            }
        })
        .collect()
}

/// 实际金额为 0 的行用同计划金额组的均值替换；均值只取自原始非零值
pub fn impute_actual_totals(rows: &mut [OrderRow]) -> ImputationMap {
    let map = ImputationMap::build(rows);

    let mut imputed = 0usize;
    for row in rows.iter_mut() {
        if let (ParsedNumber::Number(planned), ParsedNumber::Number(actual)) =
            (row.planned_total, row.actual_total)
        {
            if actual == 0.0 {
                if let Some(mean) = map.mean_for(planned) {
                    row.actual_total = ParsedNumber::Number(mean);
                    imputed += 1;
                }
            }
        }
    }

    tracing::debug!(groups = map.len(), imputed, "实际金额填补完成");
    map
}

pub fn drop_invalid_and_sort(rows: Vec<OrderRow>) -> Vec<Order> {
    let mut orders: Vec<Order> = rows
        .into_iter()
        .filter_map(|row| {
            Some(Order {
                start_date: row.start_date?,
                end_date: row.end_date,
                order_id: row.order_id,
                planned_total: row.planned_total,
                actual_total: row.actual_total,
                description: row.description,
            })
        })
        .collect();
    orders.sort_by_key(|o| o.start_date);
    orders
}

pub fn normalize(order_sheet: &OrderSheet<'_>) -> ReportResult<CleanTable> {
    let mut rows = read_rows(order_sheet);
    let total = rows.len();

    let imputation = impute_actual_totals(&mut rows);
    let orders = drop_invalid_and_sort(rows);

    if orders.is_empty() {
        tracing::warn!(rows = total, "没有任何有效的开始日期");
        return Err(ReportError::EmptyDateRange);
    }
    tracing::info!(
        rows = total,
        kept = orders.len(),
        dropped = total - orders.len(),
        "数据清洗完成"
    );
    Ok(CleanTable { orders, imputation })
}
