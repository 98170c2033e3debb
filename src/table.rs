// 报表表格：两位小数、逗号小数点；明细表与填补均值表

use crate::aggregate::duration_days;
use crate::normalize::{ImputationMap, Order};
use num_format::{Locale, ToFormattedString};
use serde::Serialize;

pub const MISSING_DESCRIPTION: &str = "Geen korte tekst beschikbaar.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub date: String,
    pub description: String,
    pub order_id: String,
    pub planned: String,
    pub actual: String,
    pub difference: String,
    pub duration_days: String,
    pub negative_difference: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImputationRow {
    pub planned_total: String,
    pub mean_actual_total: String,
}

/// 四舍五入到两位小数（银行家舍入），-0.0 归一为 0.0
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round_ties_even() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn format_decimal(value: f64) -> String {
    format!("{:.2}", round2(value)).replace('.', ",")
}

fn format_optional(value: Option<f64>) -> String {
    value.map(format_decimal).unwrap_or_default()
}

pub fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().replace(',', ".").parse::<f64>().ok()
}

/// 合计金额：千分位逗号、小数点，如 EUR 1,234.56
pub fn format_currency(value: f64) -> String {
    let rounded = round2(value);
    let cents = (rounded.abs() * 100.0).round() as i64;
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!(
        "EUR {}{}.{:02}",
        sign,
        (cents / 100).to_formatted_string(&Locale::en),
        cents % 100
    )
}

pub fn build_detail_table(orders: &[&Order], missing_description: &str) -> Vec<DetailRow> {
    orders
        .iter()
        .map(|order| {
            let planned = order.planned_total.value().map(round2);
            let actual = order.actual_total.value().map(round2);
            // 差额取自已舍入的两列，保证表内 计划 − 实际 = 差额
            let difference = match (planned, actual) {
                (Some(p), Some(a)) => Some(round2(p - a)),
                _ => None,
            };
            let difference_text = format_optional(difference);
            let negative_difference = parse_decimal(&difference_text).map_or(false, |d| d < 0.0);

            DetailRow {
                date: order.start_date.format("%Y-%m-%d").to_string(),
                description: order
                    .description
                    .clone()
                    .unwrap_or_else(|| missing_description.to_string()),
                order_id: order.order_id.clone(),
                planned: format_optional(planned),
                actual: format_optional(actual),
                difference: difference_text,
                duration_days: format_optional(duration_days(order).map(|d| d as f64)),
                negative_difference,
            }
        })
        .collect()
}

pub fn build_imputation_summary_table(map: &ImputationMap) -> Vec<ImputationRow> {
    map.iter()
        .map(|(planned, mean)| ImputationRow {
            planned_total: format_decimal(planned),
            mean_actual_total: format_decimal(mean),
        })
        .collect()
}
