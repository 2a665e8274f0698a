//! Report schema and sinks.
//!
//! The report columns are an explicit ordered schema, independent of the
//! [`Record`] field names. Sinks render that schema to a file: an Excel
//! workbook by default, Markdown or JSON on request.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, FormatAlign, Workbook};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::Result;
use crate::model::{PolicyScope, Record};

/// File name stem of every generated report.
pub const REPORT_STEM: &str = "policy_report";

const TRAILER: &str = "Report was generated by policy-report";

const SHEET_NAME: &str = "Policies";
/// Zero-based header row; the rows above it are left blank.
const HEADER_ROW: u32 = 4;
const ENTITY_COLUMN_WIDTH: f64 = 20.0;
const POLICY_COLUMN_WIDTH: f64 = 80.0;

/// What a column shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnValue {
    ProjectName,
    ProductName,
    OrgName,
    Policies(PolicyScope),
}

/// One report column: a stable key, a display label and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
    pub value: ColumnValue,
}

impl Column {
    /// Cell text for `record`; policy cells hold one display line per policy.
    pub fn cell(&self, record: &Record) -> String {
        match self.value {
            ColumnValue::ProjectName => record.project_name.clone(),
            ColumnValue::ProductName => record.product_name.clone(),
            ColumnValue::OrgName => record.org_name.clone(),
            ColumnValue::Policies(scope) => record.policy_block(scope),
        }
    }
}

/// Report columns in display order.
pub const COLUMNS: [Column; 6] = [
    Column {
        key: "project_name",
        label: "Project Name",
        value: ColumnValue::ProjectName,
    },
    Column {
        key: "project_policies",
        label: "Project Policies",
        value: ColumnValue::Policies(PolicyScope::Project),
    },
    Column {
        key: "product_name",
        label: "Product Name",
        value: ColumnValue::ProductName,
    },
    Column {
        key: "product_policies",
        label: "Product Policies",
        value: ColumnValue::Policies(PolicyScope::Product),
    },
    Column {
        key: "org_name",
        label: "Org Name",
        value: ColumnValue::OrgName,
    },
    Column {
        key: "org_policies",
        label: "Org Policies",
        value: ColumnValue::Policies(PolicyScope::Org),
    },
];

/// Consumes the organization name and records and writes a report.
pub trait ReportSink {
    /// Write the report and return the path written.
    fn write(&self, org_name: &str, records: &[Record]) -> Result<PathBuf>;
}

/// `policy_report_<YYYY-MM-DD_HH-MM-SS>.<ext>`
pub fn report_file_name(generated_at: &DateTime<Local>, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        REPORT_STEM,
        generated_at.format("%Y-%m-%d_%H-%M-%S"),
        extension
    )
}

fn write_report(output_dir: &Path, file_name: &str, content: &str, org_name: &str) -> Result<PathBuf> {
    info!("Start generating policy report...");
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(file_name);
    std::fs::write(&path, content)?;
    info!(
        "Successfully generated report for the organization - {} at: {}",
        org_name,
        path.display()
    );
    Ok(path)
}

/// Markdown table report.
#[derive(Debug, Clone)]
pub struct MarkdownReportSink {
    output_dir: PathBuf,
}

impl MarkdownReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ReportSink for MarkdownReportSink {
    fn write(&self, org_name: &str, records: &[Record]) -> Result<PathBuf> {
        let now = Local::now();
        let content = render_markdown(org_name, records, &now);
        write_report(&self.output_dir, &report_file_name(&now, "md"), &content, org_name)
    }
}

fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', "<br>")
}

/// Render the report as a Markdown document.
pub fn render_markdown(org_name: &str, records: &[Record], generated_at: &DateTime<Local>) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Policy Report - {}\n\n", org_name));

    let header: Vec<&str> = COLUMNS.iter().map(|c| c.label).collect();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!("|{}\n", "---|".repeat(COLUMNS.len())));

    for record in records {
        let cells: Vec<String> = COLUMNS
            .iter()
            .map(|c| markdown_cell(&c.cell(record)))
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    out.push('\n');
    out.push_str(TRAILER);
    out.push('\n');
    out.push_str(&generated_at.format("%d/%m/%Y %H:%M:%S").to_string());
    out.push('\n');
    out
}

/// Canonical JSON report artifact.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub schema_version: String,
    pub generated_at: String,
    pub org_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl JsonReport {
    pub fn new(org_name: &str, records: &[Record], generated_at: &DateTime<Local>) -> Self {
        let rows = records
            .iter()
            .map(|record| {
                COLUMNS
                    .iter()
                    .map(|c| (c.key.to_string(), Value::from(c.cell(record))))
                    .collect()
            })
            .collect();

        Self {
            schema_version: "1.0".to_string(),
            generated_at: generated_at.to_rfc3339(),
            org_name: org_name.to_string(),
            columns: COLUMNS.iter().map(|c| c.label.to_string()).collect(),
            rows,
        }
    }
}

/// Pretty JSON report.
#[derive(Debug, Clone)]
pub struct JsonReportSink {
    output_dir: PathBuf,
}

impl JsonReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ReportSink for JsonReportSink {
    fn write(&self, org_name: &str, records: &[Record]) -> Result<PathBuf> {
        let now = Local::now();
        let content = serde_json::to_string_pretty(&JsonReport::new(org_name, records, &now))?;
        write_report(&self.output_dir, &report_file_name(&now, "json"), &content, org_name)
    }
}

/// Excel workbook report with a single `Policies` sheet.
#[derive(Debug, Clone)]
pub struct XlsxReportSink {
    output_dir: PathBuf,
}

impl XlsxReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ReportSink for XlsxReportSink {
    fn write(&self, org_name: &str, records: &[Record]) -> Result<PathBuf> {
        info!("Start generating policy report...");
        let now = Local::now();
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(report_file_name(&now, "xlsx"));

        let mut workbook = build_workbook(records, &now)?;
        workbook.save(&path)?;

        info!(
            "Successfully generated report for the organization - {} at: {}",
            org_name,
            path.display()
        );
        Ok(path)
    }
}

/// Lay the report out on a `Policies` sheet.
///
/// Headers sit on row 5 and stay frozen above the records. Entity columns
/// are 20 wide and policy columns 80, all cells top-left aligned and
/// wrapped. The trailer and the generation time follow two rows below the
/// last record.
pub fn build_workbook(records: &[Record], generated_at: &DateTime<Local>) -> Result<Workbook> {
    let body_format = Format::new()
        .set_align(FormatAlign::Left)
        .set_align(FormatAlign::Top)
        .set_text_wrap();
    let header_format = body_format.clone().set_bold();
    let trailer_format = Format::new()
        .set_align(FormatAlign::Left)
        .set_align(FormatAlign::Top);
    let date_format = trailer_format.clone().set_num_format("dd/mm/yyyy hh:mm:ss");

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, column) in (0u16..).zip(COLUMNS.iter()) {
        let width = match column.value {
            ColumnValue::Policies(_) => POLICY_COLUMN_WIDTH,
            _ => ENTITY_COLUMN_WIDTH,
        };
        worksheet.set_column_width(col, width)?;
        worksheet.set_column_format(col, &body_format)?;
        worksheet.write_string_with_format(HEADER_ROW, col, column.label, &header_format)?;
    }

    let mut row = HEADER_ROW + 1;
    worksheet.set_freeze_panes(row, 0)?;
    for record in records {
        for (col, column) in (0u16..).zip(COLUMNS.iter()) {
            worksheet.write_string_with_format(row, col, column.cell(record), &body_format)?;
        }
        row += 1;
    }

    worksheet.write_string_with_format(row + 2, 0, TRAILER, &trailer_format)?;
    worksheet.write_datetime_with_format(row + 3, 0, &generated_at.naive_local(), &date_format)?;

    Ok(workbook)
}
