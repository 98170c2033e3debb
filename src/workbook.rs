use crate::error::{ReportError, ReportResult};
use calamine::{open_workbook, DataType, Reader, Xlsx};
use std::io::{Cursor, Read, Seek};
use std::path::Path;

/// 一个工作表：表头（已去空白）加原始单元格行
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<DataType>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, headers: &[&str], rows: Vec<Vec<DataType>>) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(|h| h.trim().to_string()).collect(),
            rows,
        }
    }

    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }
}

/// 按扩展名判断是否为 .xlsx
pub fn ensure_xlsx<P: AsRef<Path>>(file_path: P) -> ReportResult<()> {
    let ext = file_path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if ext != "xlsx" {
        return Err(ReportError::UnsupportedFormat(ext));
    }
    Ok(())
}

pub fn read_workbook<P: AsRef<Path>>(file_path: P) -> ReportResult<Vec<Sheet>> {
    let path = file_path.as_ref();
    ensure_xlsx(path)?;

    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheets = collect_sheets(&mut workbook)?;
    tracing::debug!(path = %path.display(), sheets = sheets.len(), "工作簿已读取");
    Ok(sheets)
}

/// 从内存读取，供上传文件直接解析
pub fn read_workbook_bytes(bytes: &[u8]) -> ReportResult<Vec<Sheet>> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    let sheets = collect_sheets(&mut workbook)?;
    tracing::debug!(bytes = bytes.len(), sheets = sheets.len(), "工作簿已读取");
    Ok(sheets)
}

fn collect_sheets<RS: Read + Seek>(workbook: &mut Xlsx<RS>) -> ReportResult<Vec<Sheet>> {
    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_owned() {
        let range = match workbook.worksheet_range(&name) {
            Some(Ok(range)) => range,
            Some(Err(e)) => return Err(e.into()),
            None => continue,
        };

        let mut rows = range.rows();
        // 空工作表没有表头，照样保留，交给列定位去跳过
        let headers: Vec<String> = rows
            .next()
            .map(|row| row.iter().map(|c| c.to_string().trim().to_string()).collect())
            .unwrap_or_default();

        let data: Vec<Vec<DataType>> = rows
            .filter(|row| !row.iter().all(|c| matches!(c, DataType::Empty)))
            .map(|row| row.to_vec())
            .collect();

        tracing::debug!(sheet = %name, columns = headers.len(), rows = data.len(), "读取工作表");
        sheets.push(Sheet { name, headers, rows: data });
    }
    Ok(sheets)
}

/// 单元格转文本；整数值的浮点数不带小数点（订单号常以数字存储）
pub fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        DataType::String(s) => s.trim().to_string(),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
            format!("{:.0}", f)
        }
        DataType::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}
