// 报告导出：六个章节依次排版，每节单独一页
// 订单数 → 成本 → 累计成本 → 明细 → 填补均值 → 合计

use crate::aggregate::DateRange;
use crate::config::ReportConfig;
use crate::error::{ReportError, ReportResult};
use crate::pipeline::OrderReport;
use crate::table::{format_currency, format_decimal};
use docx_rs::*;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const DETAIL_HEADERS: [&str; 7] = [
    "Datum",
    "Omschrijving",
    "Order",
    "Gepland totaal",
    "Werk. totaal",
    "Verschil",
    "Duur in dagen",
];

fn text_cell(text: &str, size: usize, bold: bool, color: Option<&str>) -> TableCell {
    let mut run = Run::new().add_text(text).size(size * 2);
    if bold {
        run = run.bold();
    }
    if let Some(color) = color {
        run = run.color(color);
    }
    TableCell::new().add_paragraph(Paragraph::new().add_run(run).align(AlignmentType::Center))
}

fn header_row(headers: &[&str], size: usize) -> TableRow {
    TableRow::new(headers.iter().map(|h| text_cell(h, size, true, None)).collect())
}

fn heading(text: &str, size: usize) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text).bold().size(size * 2))
}

fn note(text: &str, size: usize) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text).italic().size(size * 2))
}

fn page_break() -> Paragraph {
    Paragraph::new().add_run(Run::new().add_break(BreakType::Page))
}

/// 文本柱状条，长度与 value / max 成比例；非正值不画
fn bar(value: f64, max: f64, width: usize) -> String {
    if max <= 0.0 || value <= 0.0 || !value.is_finite() {
        return String::new();
    }
    let len = ((value / max) * width as f64).round() as usize;
    "█".repeat(len.min(width))
}

/// 副标题：工作表名与所选日期范围（含两端）
fn selection_line(sheet: &str, range: &DateRange) -> String {
    format!("{}: {} t/m {}", sheet, range.start, range.end)
}

pub fn render_report(report: &OrderReport, config: &ReportConfig) -> ReportResult<Vec<u8>> {
    let period = config.period_label(report.granularity);
    let body = config.section_font_size;
    let small = config.table_font_size;

    let mut doc = Docx::new();

    doc = doc.add_paragraph(
        Paragraph::new()
            .add_run(
                Run::new()
                    .add_text(&config.document_title)
                    .bold()
                    .size(config.title_font_size * 2),
            )
            .align(AlignmentType::Center),
    );
    doc = doc.add_paragraph(Paragraph::new().add_run(
        Run::new()
            .add_text(selection_line(&report.sheet, &report.selected))
            .size(small * 2),
    ));

    // 1. 订单数
    doc = doc.add_paragraph(heading(
        &config.section_title(&config.sections.order_counts, report.granularity),
        body,
    ));
    if report.periods.is_empty() {
        doc = doc.add_paragraph(note(&config.empty_note, body));
    } else {
        let max = report.periods.iter().map(|p| p.order_count).max().unwrap_or(0) as f64;
        let mut rows = vec![header_row(&[period, "Aantal Orders", ""], small)];
        for p in &report.periods {
            rows.push(TableRow::new(vec![
                text_cell(&p.period.to_string(), small, false, None),
                text_cell(&p.order_count.to_string(), small, false, None),
                text_cell(&bar(p.order_count as f64, max, config.bar_width), small, false, None),
            ]));
        }
        doc = doc.add_table(Table::new(rows));
    }
    doc = doc.add_paragraph(page_break());

    // 2. 计划/实际/差额；实际为 0 的时间段展示计划值并着色
    doc = doc.add_paragraph(heading(
        &config.section_title(&config.sections.costs, report.granularity),
        body,
    ));
    if report.periods.is_empty() {
        doc = doc.add_paragraph(note(&config.empty_note, body));
    } else {
        let mut rows = vec![header_row(
            &[period, "Gepland totaal", "Werk. totaal", "Verschil"],
            small,
        )];
        for p in &report.periods {
            let actual_color = p
                .used_planned_fallback
                .then_some(config.fallback_color.as_str());
            rows.push(TableRow::new(vec![
                text_cell(&p.period.to_string(), small, false, None),
                text_cell(&format_decimal(p.planned), small, false, None),
                text_cell(&format_decimal(p.displayed_actual), small, false, actual_color),
                text_cell(&format_decimal(p.difference), small, false, None),
            ]));
        }
        doc = doc.add_table(Table::new(rows));
        if report.periods.iter().any(|p| p.used_planned_fallback) {
            doc = doc.add_paragraph(note(&config.fallback_note, small));
        }
    }
    doc = doc.add_paragraph(page_break());

    // 3. 累计实际成本
    doc = doc.add_paragraph(heading(&config.sections.cumulative, body));
    if report.cumulative.is_empty() {
        doc = doc.add_paragraph(note(&config.empty_note, body));
    } else {
        let max = report.cumulative.iter().map(|c| c.value).fold(0.0, f64::max);
        let mut rows = vec![header_row(&[period, "Cumulatief werkelijk", ""], small)];
        for c in &report.cumulative {
            rows.push(TableRow::new(vec![
                text_cell(&c.period.to_string(), small, false, None),
                text_cell(&format_decimal(c.value), small, false, None),
                text_cell(&bar(c.value, max, config.bar_width), small, false, None),
            ]));
        }
        doc = doc.add_table(Table::new(rows));
    }
    doc = doc.add_paragraph(page_break());

    // 4. 明细，负差额标红
    doc = doc.add_paragraph(heading(&config.sections.details, body));
    if report.details.is_empty() {
        doc = doc.add_paragraph(note(&config.empty_note, body));
    } else {
        let mut rows = vec![header_row(&DETAIL_HEADERS, small)];
        for d in &report.details {
            let diff_color = d
                .negative_difference
                .then_some(config.negative_color.as_str());
            rows.push(TableRow::new(vec![
                text_cell(&d.date, small, false, None),
                text_cell(&d.description, small, false, None),
                text_cell(&d.order_id, small, false, None),
                text_cell(&d.planned, small, false, None),
                text_cell(&d.actual, small, false, None),
                text_cell(&d.difference, small, false, diff_color),
                text_cell(&d.duration_days, small, false, None),
            ]));
        }
        doc = doc.add_table(Table::new(rows));
    }
    doc = doc.add_paragraph(page_break());

    // 5. 填补均值表
    doc = doc.add_paragraph(heading(&config.sections.imputation, body));
    if report.imputation_summary.is_empty() {
        doc = doc.add_paragraph(note(&config.empty_note, body));
    } else {
        let mut rows = vec![header_row(&["Gepland totaal", "Gemiddelde Werk. totaal"], small)];
        for r in &report.imputation_summary {
            rows.push(TableRow::new(vec![
                text_cell(&r.planned_total, small, false, None),
                text_cell(&r.mean_actual_total, small, false, None),
            ]));
        }
        doc = doc.add_table(Table::new(rows));
    }
    doc = doc.add_paragraph(page_break());

    // 6. 合计
    doc = doc.add_paragraph(heading(&config.sections.totals, body));
    for (label, value) in [
        ("Totaal Gepland", report.totals.planned),
        ("Totaal Werkelijk", report.totals.actual),
        ("Verschil", report.totals.difference),
    ] {
        doc = doc.add_paragraph(Paragraph::new().add_run(
            Run::new()
                .add_text(format!("{}: {}", label, format_currency(value)))
                .size(body * 2),
        ));
    }

    let mut buf = Vec::new();
    doc.build()
        .pack(&mut std::io::Cursor::new(&mut buf))
        .map_err(|e| ReportError::Render(e.to_string()))?;
    tracing::debug!(bytes = buf.len(), "报告已生成");
    Ok(buf)
}

/// 先写入同目录的临时文件，成功后再改名；失败时临时文件随 drop 删除
pub fn write_report<P: AsRef<Path>>(path: P, bytes: &[u8]) -> ReportResult<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| ReportError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_lengths() {
        assert_eq!(bar(10.0, 10.0, 20).chars().count(), 20);
        assert_eq!(bar(5.0, 10.0, 20).chars().count(), 10);
        assert_eq!(bar(0.0, 10.0, 20), "");
        assert_eq!(bar(-3.0, 10.0, 20), "");
        assert_eq!(bar(3.0, 0.0, 20), "");
    }

    #[test]
    fn test_selection_line() {
        let range = DateRange::new(
            chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        )
        .unwrap();
        let line = selection_line("Orders", &range);
        assert_eq!(line, "Orders: 2024-01-15 t/m 2024-03-10");
        assert!(line.is_ascii());
    }

    #[test]
    fn test_write_report_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("orders.docx");
        std::fs::write(&target, b"old").unwrap();

        write_report(&target, b"new content").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new content");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_report_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("orders.docx");

        assert!(matches!(write_report(&target, b"x"), Err(ReportError::Io(_))));
        assert!(!target.exists());
    }
}
