use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use orders_analysis::{
    logging, read_workbook, render_report, run, write_report, Granularity, ReportConfig,
    ReportRequest,
};

#[derive(Parser)]
#[command(name = "orders_report")]
#[command(about = "订单成本分析：Excel 订单表 → 汇总 / Word 报告")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 生成 Word 报告
    Report {
        #[command(flatten)]
        selection: Selection,
        /// 输出文件路径（.docx）
        #[arg(short, long)]
        output: String,
        /// 报告配置文件（JSON），缺省使用内置配置
        #[arg(short, long)]
        config: Option<String>,
    },
    /// 以 JSON 输出汇总结果
    Summary {
        #[command(flatten)]
        selection: Selection,
        /// 格式化输出
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Args)]
struct Selection {
    /// 输入文件路径（.xlsx）
    #[arg(short, long)]
    input: String,
    /// 分组粒度
    #[arg(short, long, value_enum, default_value_t = Granularity::Month)]
    granularity: Granularity,
    /// 起始日期（含），YYYY-MM-DD
    #[arg(long)]
    from: Option<NaiveDate>,
    /// 截止日期（含），YYYY-MM-DD
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl Selection {
    fn request(&self) -> ReportRequest {
        ReportRequest {
            granularity: self.granularity,
            from: self.from,
            to: self.to,
        }
    }

    fn compute(&self) -> Result<orders_analysis::OrderReport> {
        let sheets = read_workbook(&self.input)
            .with_context(|| format!("无法读取Excel文件: {}", self.input))?;
        let report = run(&sheets, &self.request()).context("汇总订单数据失败")?;
        Ok(report)
    }
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Report {
            selection,
            output,
            config,
        } => {
            let config = match config {
                Some(path) => ReportConfig::load_from_file(path)
                    .with_context(|| format!("无法读取配置文件: {}", path))?,
                None => ReportConfig::load_default()?,
            };
            let report = selection.compute()?;
            let docx_content = render_report(&report, &config)?;
            write_report(output, &docx_content)
                .with_context(|| format!("无法写入报告: {}", output))?;
            tracing::info!(output = %output, periods = report.periods.len(), "Word报告生成成功");
        }
        Commands::Summary { selection, pretty } => {
            let report = selection.compute()?;
            let json = if *pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{}", json);
        }
    }

    Ok(())
}
