use axum::{
    extract::Multipart,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;

use orders_analysis::{
    ensure_xlsx, logging, read_workbook_bytes, render_report, run, Granularity, OrderReport,
    ReportConfig, ReportRequest,
};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let app = Router::new()
        .route("/", get(index))
        .route("/report", post(report))
        .route("/summary", post(summary));

    let port = std::env::var("PORT").unwrap_or_else(|_| "3002".to_string());
    let addr = format!("0.0.0.0:{}", port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听地址: {}", addr))?;
    tracing::info!(addr = %addr, "订单分析服务已启动");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> impl IntoResponse {
    Html(r#"<!doctype html>
<html lang="zh-CN">
<head>
<meta charset="utf-8"/>
<title>订单成本分析</title>
<meta name="viewport" content="width=device-width, initial-scale=1"/>
<style>
body{font-family:-apple-system,BlinkMacSystemFont,Segoe UI,Roboto,Helvetica,Arial,sans-serif;padding:24px;}
.card{max-width:680px;margin:0 auto;border:1px solid #e5e7eb;border-radius:12px;padding:24px;box-shadow:0 10px 25px rgba(0,0,0,0.05)}
label{display:block;margin:12px 0 6px;color:#374151}
input[type=file],input[type=text],input[type=date],select{width:100%;padding:10px;border:1px solid #d1d5db;border-radius:8px}
button{margin-top:16px;padding:10px 16px;background:#2563eb;color:white;border:none;border-radius:8px;cursor:pointer}
small{color:#6b7280}
</style>
</head>
<body>
<div class="card">
  <h2>订单成本分析</h2>
  <form action="/report" method="post" enctype="multipart/form-data">
    <label>选择订单文件（.xlsx）</label>
    <input name="file" type="file" accept=".xlsx" required />
    <label>分组粒度</label>
    <select name="granularity">
      <option value="week">Week</option>
      <option value="month" selected>Maand</option>
      <option value="year">Jaar</option>
    </select>
    <label>起始日期（可选）</label>
    <input name="from" type="date"/>
    <label>截止日期（可选）</label>
    <input name="to" type="date"/>
    <label>报告标题（可选）</label>
    <input name="title" type="text" placeholder="例如：Orders Analyse 2024"/>
    <button type="submit">生成Word</button>
    <div><small>提示：工作表需包含 Basisstartterm.、BasEindterm.、Order、Gepland totaal、Werk. totaal 列。</small></div>
  </form>
</div>
</body>
</html>"#)
}

#[derive(Default)]
struct UploadForm {
    file_name: Option<String>,
    bytes: Vec<u8>,
    granularity: String,
    from: String,
    to: String,
    title: String,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await.context("读取表单失败")? {
            let name = field.name().map(|s| s.to_string()).unwrap_or_default();
            if name == "file" {
                let orig_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload.xlsx".to_string());
                form.bytes = field.bytes().await.context("读取上传文件失败")?.to_vec();
                tracing::info!(file = %orig_name, bytes = form.bytes.len(), "收到上传文件");
                form.file_name = Some(orig_name);
            } else {
                let value = field.text().await.unwrap_or_default();
                match name.as_str() {
                    "granularity" => form.granularity = value,
                    "from" => form.from = value,
                    "to" => form.to = value,
                    "title" => form.title = value,
                    _ => {}
                }
            }
        }
        Ok(form)
    }

    fn request(&self) -> Result<ReportRequest> {
        let granularity = if self.granularity.trim().is_empty() {
            Granularity::default()
        } else {
            self.granularity
                .parse::<Granularity>()
                .map_err(anyhow::Error::msg)?
        };
        Ok(ReportRequest {
            granularity,
            from: parse_form_date(&self.from)?,
            to: parse_form_date(&self.to)?,
        })
    }
}

fn parse_form_date(value: &str) -> Result<Option<NaiveDate>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .with_context(|| format!("日期格式错误（应为 YYYY-MM-DD）: {}", value))
}

fn bad_request(e: anyhow::Error) -> Response {
    tracing::warn!(error = %format!("{:#}", e), "请求处理失败");
    (StatusCode::BAD_REQUEST, Html(format!("生成失败：{:#}", e))).into_response()
}

/// 上传内容直接在内存中解析，扩展名只用于格式判断
fn analyse_upload(form: &UploadForm) -> Result<OrderReport> {
    let orig_name = form.file_name.as_deref().context("上传失败：未收到文件")?;
    let request = form.request()?;

    ensure_xlsx(orig_name)?;
    let sheets = read_workbook_bytes(&form.bytes).context("无法读取Excel文件")?;
    let report = run(&sheets, &request).context("汇总订单数据失败")?;
    Ok(report)
}

/// 解析与排版都是同步计算，放到阻塞线程池执行
async fn blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .context("后台任务异常退出")?
}

async fn summary(multipart: Multipart) -> Response {
    let form = match UploadForm::read(multipart).await {
        Ok(form) => form,
        Err(e) => return bad_request(e),
    };
    match blocking(move || analyse_upload(&form)).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => bad_request(e),
    }
}

async fn report(multipart: Multipart) -> Response {
    let form = match UploadForm::read(multipart).await {
        Ok(form) => form,
        Err(e) => return bad_request(e),
    };
    match blocking(move || build_docx(&form)).await {
        Ok((filename, bytes)) => (
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                        .to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => bad_request(e),
    }
}

fn build_docx(form: &UploadForm) -> Result<(String, Vec<u8>)> {
    let report = analyse_upload(form)?;

    let mut config = ReportConfig::load_default()?;
    let title = form.title.trim();
    if !title.is_empty() {
        config.document_title = title.to_string();
    }
    let docx_content = render_report(&report, &config).context("生成Word文档失败")?;

    Ok((report_filename(title), docx_content))
}

fn report_filename(title: &str) -> String {
    if title.is_empty() {
        let now = chrono::Local::now();
        return format!("orders_report_{}.docx", now.format("%Y%m"));
    }
    let clean_title: String = title
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            // 响应头只接受可见 ASCII
            c if !c.is_ascii_graphic() => '_',
            c => c,
        })
        .collect();
    format!("{}.docx", clean_title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_filename() {
        assert_eq!(report_filename("Orders 2024/Q1"), "Orders_2024_Q1.docx");
        assert_eq!(report_filename("订单 2024"), "___2024.docx");
        assert!(report_filename("").starts_with("orders_report_"));
    }

    #[test]
    fn test_form_request() {
        let form = UploadForm {
            granularity: "jaar".to_string(),
            from: "2024-01-01".to_string(),
            ..Default::default()
        };
        let request = form.request().unwrap();
        assert_eq!(request.granularity, Granularity::Year);
        assert_eq!(request.from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(request.to, None);

        let bad = UploadForm {
            to: "01/02/2024".to_string(),
            ..Default::default()
        };
        assert!(bad.request().is_err());
    }

    #[test]
    fn test_analyse_upload_requires_file() {
        let form = UploadForm::default();
        assert!(analyse_upload(&form).is_err());
    }

    #[test]
    fn test_analyse_upload_rejects_non_xlsx_name() {
        let form = UploadForm {
            file_name: Some("orders.csv".to_string()),
            bytes: b"Order,Gepland totaal".to_vec(),
            ..Default::default()
        };
        let err = analyse_upload(&form).unwrap_err();
        assert!(format!("{:#}", err).contains("csv"));
    }

    #[tokio::test]
    async fn test_blocking_propagates_errors() {
        let value = blocking(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);

        let err = blocking(|| -> Result<()> { anyhow::bail!("坏数据") }).await.unwrap_err();
        assert!(err.to_string().contains("坏数据"));
    }
}
