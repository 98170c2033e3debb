use crate::error::{ReportError, ReportResult};
use crate::normalize::Order;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Week,
    #[default]
    #[value(alias = "maand")]
    Month,
    #[value(alias = "jaar")]
    Year,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" | "w" => Ok(Granularity::Week),
            "month" | "maand" | "m" => Ok(Granularity::Month),
            "year" | "jaar" | "y" => Ok(Granularity::Year),
            other => Err(format!("未知的分组粒度: {}", other)),
        }
    }
}

/// 时间段键；同一次聚合内只会出现同一种粒度，派生的 Ord 即时间顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodKey {
    Week { year: i32, week: u32 },
    Month { year: i32, month: u32 },
    Year(i32),
}

impl PeriodKey {
    pub fn from_date(date: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            // 周日起始的周序号，元旦到第一个周日之前为第 00 周
            Granularity::Week => PeriodKey::Week {
                year: date.year(),
                week: (date.ordinal0() + 7 - date.weekday().num_days_from_sunday()) / 7,
            },
            Granularity::Month => PeriodKey::Month {
                year: date.year(),
                month: date.month(),
            },
            Granularity::Year => PeriodKey::Year(date.year()),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Week { year, week } => write!(f, "{:04}-W{:02}", year, week),
            PeriodKey::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
            PeriodKey::Year(year) => write!(f, "{}", year),
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn assign_bucket(order: &Order, granularity: Granularity) -> PeriodKey {
    PeriodKey::from_date(order.start_date, granularity)
}

/// 闭区间日期范围，start <= end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> ReportResult<Self> {
        if start > end {
            return Err(ReportError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// 订单开始日期的最小/最大值
    pub fn spanning(orders: &[Order]) -> Option<Self> {
        let start = orders.iter().map(|o| o.start_date).min()?;
        let end = orders.iter().map(|o| o.start_date).max()?;
        Some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

pub fn filter_by_date_range<'a>(orders: &'a [Order], range: &DateRange) -> Vec<&'a Order> {
    orders.iter().filter(|o| range.contains(o.start_date)).collect()
}

/// 结束日期减开始日期的整天数，向下取整，不做截断
pub fn duration_days(order: &Order) -> Option<i64> {
    let start = order.start_date.and_hms_opt(0, 0, 0)?;
    let end = order.end_date?;
    Some((end - start).num_seconds().div_euclid(86_400))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodMetrics {
    pub period: PeriodKey,
    pub order_count: usize,
    pub planned: f64,
    pub actual: f64,
    pub difference: f64,
    /// 实际合计为 0 时展示计划合计
    pub displayed_actual: f64,
    pub used_planned_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativePoint {
    pub period: PeriodKey,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Totals {
    pub planned: f64,
    pub actual: f64,
    pub difference: f64,
}

pub fn aggregate(orders: &[&Order], granularity: Granularity) -> Vec<PeriodMetrics> {
    #[derive(Default)]
    struct Acc {
        order_count: usize,
        planned: f64,
        actual: f64,
    }

    let mut buckets: BTreeMap<PeriodKey, Acc> = BTreeMap::new();
    for order in orders {
        let acc = buckets.entry(assign_bucket(order, granularity)).or_default();
        if !order.order_id.is_empty() {
            acc.order_count += 1;
        }
        acc.planned += order.planned_total.value().unwrap_or(0.0);
        acc.actual += order.actual_total.value().unwrap_or(0.0);
    }

    buckets
        .into_iter()
        .map(|(period, acc)| {
            let used_planned_fallback = acc.actual == 0.0;
            PeriodMetrics {
                period,
                order_count: acc.order_count,
                planned: acc.planned,
                actual: acc.actual,
                difference: acc.planned - acc.actual,
                displayed_actual: if used_planned_fallback { acc.planned } else { acc.actual },
                used_planned_fallback,
            }
        })
        .collect()
}

/// 按时间顺序累加展示用实际金额
pub fn cumulative_actual(periods: &[PeriodMetrics]) -> Vec<CumulativePoint> {
    let mut running = 0.0;
    periods
        .iter()
        .map(|p| {
            running += p.displayed_actual;
            CumulativePoint {
                period: p.period,
                value: running,
            }
        })
        .collect()
}

pub fn totals(periods: &[PeriodMetrics]) -> Totals {
    let planned: f64 = periods.iter().map(|p| p.planned).sum();
    let actual: f64 = periods.iter().map(|p| p.displayed_actual).sum();
    Totals {
        planned,
        actual,
        difference: planned - actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::ParsedNumber;
    use chrono::NaiveDateTime;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn order(date: NaiveDate, planned: f64, actual: f64) -> Order {
        Order {
            start_date: date,
            end_date: None,
            order_id: format!("{}", date),
            planned_total: ParsedNumber::Number(planned),
            actual_total: ParsedNumber::Number(actual),
            description: None,
        }
    }

    #[test]
    fn test_week_key_sunday_based() {
        // 2024-01-01 是周一，第一个周日是 01-07
        assert_eq!(PeriodKey::from_date(ymd(2024, 1, 1), Granularity::Week).to_string(), "2024-W00");
        assert_eq!(PeriodKey::from_date(ymd(2024, 1, 6), Granularity::Week).to_string(), "2024-W00");
        assert_eq!(PeriodKey::from_date(ymd(2024, 1, 7), Granularity::Week).to_string(), "2024-W01");
        assert_eq!(PeriodKey::from_date(ymd(2023, 1, 1), Granularity::Week).to_string(), "2023-W01");
        assert_eq!(PeriodKey::from_date(ymd(2024, 12, 31), Granularity::Week).to_string(), "2024-W52");
    }

    #[test]
    fn test_week_key_matches_strftime() {
        let mut date = ymd(2023, 12, 20);
        while date < ymd(2025, 1, 20) {
            let key = PeriodKey::from_date(date, Granularity::Week).to_string();
            assert_eq!(key, date.format("%Y-W%U").to_string());
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_month_and_year_keys() {
        assert_eq!(PeriodKey::from_date(ymd(2024, 3, 9), Granularity::Month).to_string(), "2024-03");
        assert_eq!(PeriodKey::from_date(ymd(2024, 3, 9), Granularity::Year).to_string(), "2024");
    }

    #[test]
    fn test_granularity_from_str() {
        assert_eq!("Maand".parse::<Granularity>(), Ok(Granularity::Month));
        assert_eq!("jaar".parse::<Granularity>(), Ok(Granularity::Year));
        assert_eq!("WEEK".parse::<Granularity>(), Ok(Granularity::Week));
        assert!("kwartaal".parse::<Granularity>().is_err());
    }

    #[test]
    fn test_granularity_value_enum_aliases() {
        use clap::ValueEnum;
        let parse = |s: &str| <Granularity as ValueEnum>::from_str(s, true);
        assert_eq!(parse("maand"), Ok(Granularity::Month));
        assert_eq!(parse("Jaar"), Ok(Granularity::Year));
        assert_eq!(parse("week"), Ok(Granularity::Week));
        assert!(parse("kwartaal").is_err());
    }

    #[test]
    fn test_month_bucket_combines_records() {
        let orders = vec![order(ymd(2024, 1, 15), 100.0, 40.0), order(ymd(2024, 1, 20), 50.0, 70.0)];
        let refs: Vec<&Order> = orders.iter().collect();

        let periods = aggregate(&refs, Granularity::Month);
        assert_eq!(periods.len(), 1);
        let p = &periods[0];
        assert_eq!(p.period.to_string(), "2024-01");
        assert_eq!(p.order_count, 2);
        assert_eq!(p.planned, 150.0);
        assert_eq!(p.actual, 110.0);
        assert_eq!(p.difference, 40.0);
        assert!(!p.used_planned_fallback);
    }

    #[test]
    fn test_zero_actual_bucket_uses_planned_fallback() {
        let orders = vec![order(ymd(2024, 2, 1), 120.0, 0.0), order(ymd(2024, 3, 1), 10.0, 5.0)];
        let refs: Vec<&Order> = orders.iter().collect();

        let periods = aggregate(&refs, Granularity::Month);
        assert!(periods[0].used_planned_fallback);
        assert_eq!(periods[0].actual, 0.0);
        assert_eq!(periods[0].displayed_actual, 120.0);
        assert_eq!(periods[0].difference, 120.0);

        let cumulative = cumulative_actual(&periods);
        assert_eq!(cumulative[0].value, 120.0);
        assert_eq!(cumulative[1].value, 125.0);

        let t = totals(&periods);
        assert_eq!(t.planned, 130.0);
        assert_eq!(t.actual, 125.0);
        assert_eq!(t.difference, 5.0);
    }

    #[test]
    fn test_buckets_sorted_chronologically() {
        let orders = vec![
            order(ymd(2025, 1, 3), 1.0, 1.0),
            order(ymd(2023, 11, 3), 1.0, 1.0),
            order(ymd(2024, 6, 3), 1.0, 1.0),
        ];
        let refs: Vec<&Order> = orders.iter().collect();

        let labels: Vec<String> = aggregate(&refs, Granularity::Year)
            .iter()
            .map(|p| p.period.to_string())
            .collect();
        assert_eq!(labels, vec!["2023", "2024", "2025"]);
    }

    #[test]
    fn test_cumulative_non_decreasing() {
        let orders: Vec<Order> = (1..=12)
            .map(|m| order(ymd(2024, m, 1), m as f64 * 3.0, (m % 3) as f64 * 7.5))
            .collect();
        let refs: Vec<&Order> = orders.iter().collect();

        let cumulative = cumulative_actual(&aggregate(&refs, Granularity::Month));
        assert_eq!(cumulative.len(), 12);
        assert!(cumulative.windows(2).all(|w| w[0].value <= w[1].value));
    }

    #[test]
    fn test_order_count_skips_empty_ids() {
        let mut blank = order(ymd(2024, 1, 2), 1.0, 1.0);
        blank.order_id = String::new();
        let orders = vec![blank, order(ymd(2024, 1, 3), 1.0, 1.0)];
        let refs: Vec<&Order> = orders.iter().collect();

        let periods = aggregate(&refs, Granularity::Month);
        assert_eq!(periods[0].order_count, 1);
        assert_eq!(periods[0].planned, 2.0);
    }

    #[test]
    fn test_filter_single_day() {
        let orders = vec![
            order(ymd(2024, 1, 14), 1.0, 1.0),
            order(ymd(2024, 1, 15), 2.0, 1.0),
            order(ymd(2024, 1, 15), 3.0, 1.0),
            order(ymd(2024, 1, 16), 4.0, 1.0),
        ];
        let day = ymd(2024, 1, 15);
        let range = DateRange::new(day, day).unwrap();

        let kept = filter_by_date_range(&orders, &range);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|o| o.start_date == day));
    }

    #[test]
    fn test_invalid_range_rejected() {
        let result = DateRange::new(ymd(2024, 2, 1), ymd(2024, 1, 1));
        assert!(matches!(result, Err(ReportError::InvalidDateRange { .. })));
    }

    #[test]
    fn test_duration_days_floors() {
        let mut o = order(ymd(2024, 1, 10), 1.0, 1.0);
        assert_eq!(duration_days(&o), None);

        let at = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        o.end_date = Some(at("2024-01-15 12:00:00"));
        assert_eq!(duration_days(&o), Some(5));
        o.end_date = Some(at("2024-01-09 12:00:00"));
        assert_eq!(duration_days(&o), Some(-1));
        o.end_date = Some(at("2024-01-03 00:00:00"));
        assert_eq!(duration_days(&o), Some(-7));
    }
}
