//! HTML rendering for the upload page and segmentation report.
//!
//! Pages are plain server-rendered strings: a shared shell with inline
//! CSS, an upload form, and the report sections. No templates, no
//! client-side scripting.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use polars::prelude::DataFrame;

use crate::data::{self, PREVIEW_ROWS, REQUIRED_COLUMNS};
use crate::pipeline::{Outcome, UploadReport};

const PAGE_CSS: &str = r#"
body {
    background-color: rgb(247, 243, 221);
    font-family: sans-serif;
    margin: 0 auto;
    max-width: 960px;
    padding: 24px;
}
.app-title {
    color: #4CAF50;
    font-size: 36px;
    font-weight: bold;
    text-align: center;
    padding-bottom: 65px;
}
.upload-section {
    font-size: 24px;
    font-weight: bold;
    margin-bottom: 8px;
}
.upload-form {
    margin-bottom: 24px;
}
.success-message {
    color: #4CAF50;
    font-size: 20px;
    font-weight: bold;
    margin: 16px 0;
}
.error-message {
    color: #ff4d4d;
    font-size: 18px;
    font-weight: bold;
    margin: 16px 0;
}
.info-message {
    font-size: 18px;
    margin: 16px 0;
}
.preview-table {
    border-collapse: collapse;
    margin: 16px 0;
}
.preview-table th,
.preview-table td {
    border: 1px solid #ccc;
    padding: 6px 12px;
    text-align: left;
}
.preview-table th {
    background-color: #e8e4cf;
}
.row-count {
    color: #666;
    font-size: 14px;
}
.chart {
    margin: 16px 0;
}
.download-button {
    display: inline-block;
    background-color: #4CAF50;
    color: white;
    padding: 10px 18px;
    border-radius: 4px;
    text-decoration: none;
    font-weight: bold;
}
"#;

/// Landing page: upload form plus a hint that nothing has been uploaded.
pub fn index_page() -> String {
    let body = format!(
        "{}\n<div class=\"info-message\">ℹ️ Please upload a CSV file to proceed.</div>",
        upload_form()
    );
    page_shell(&body)
}

/// Report for a processed upload.
///
/// The uploaded-data preview is always rendered. A scored upload gets the
/// clustered preview, the scatter chart, and the download link after it; an
/// upload missing required columns gets the error banner instead.
pub fn report_page(report: &UploadReport) -> String {
    let mut body = upload_form();

    body.push_str("\n<h4>🗂️ Uploaded Data Preview</h4>\n");
    body.push_str(&preview_section(&report.table));

    match &report.outcome {
        Outcome::Segmented(segmentation) => {
            body.push_str("\n<div class=\"success-message\">✅ Processing Data...</div>\n");

            body.push_str("\n<h4>🏷️ Clustered Data</h4>\n");
            body.push_str(&preview_section(&segmentation.table));

            body.push_str("\n<h4>📊 Cluster Visualization</h4>\n");
            body.push_str("<div class=\"chart\">\n");
            body.push_str(&segmentation.chart_svg);
            body.push_str("\n</div>\n");

            body.push_str("\n<h4>📤 Download Clustered Data</h4>\n");
            body.push_str(&download_link(&segmentation.csv));
        }
        Outcome::MissingColumns { .. } => {
            body.push_str(&format!(
                "\n<div class=\"error-message\">❌ The uploaded file must contain the following columns: {}</div>",
                python_list(&REQUIRED_COLUMNS)
            ));
        }
    }

    page_shell(&body)
}

/// Page shown when an upload fails outright (unparseable file, scoring
/// failure). If the upload parsed before failing, pass the table so its
/// preview still renders above the banner, matching the report layout.
/// The message is escaped before rendering.
pub fn error_page(message: &str, table: Option<&DataFrame>) -> String {
    let mut body = upload_form();

    if let Some(table) = table {
        body.push_str("\n<h4>🗂️ Uploaded Data Preview</h4>\n");
        body.push_str(&preview_section(table));
    }

    body.push_str(&format!(
        "\n<div class=\"error-message\">❌ {}</div>",
        escape_html(message)
    ));
    page_shell(&body)
}

fn page_shell(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Customer Segmentation</title>
<style>{PAGE_CSS}</style>
</head>
<body>
<h1 class="app-title">📊 Customer Segmentation with CSV Upload</h1>
{body}
</body>
</html>
"#
    )
}

fn upload_form() -> String {
    String::from(
        r#"<div class="upload-section">📂 Upload Customer Data</div>
<form class="upload-form" method="post" action="/" enctype="multipart/form-data">
<label for="file">📥 Choose a CSV file</label>
<input type="file" id="file" name="file" accept=".csv">
<button type="submit">Upload</button>
</form>"#,
    )
}

fn preview_section(df: &DataFrame) -> String {
    let preview = data::preview(df, PREVIEW_ROWS);
    let mut html = html_table(&preview);
    if preview.total_rows > preview.rows.len() {
        html.push_str(&format!(
            "\n<div class=\"row-count\">Showing first {} of {} rows</div>",
            preview.rows.len(),
            preview.total_rows
        ));
    }
    html
}

fn html_table(preview: &data::TablePreview) -> String {
    let mut html = String::from("<table class=\"preview-table\">\n<thead><tr>");
    for column in &preview.columns {
        html.push_str("<th>");
        html.push_str(&escape_html(column));
        html.push_str("</th>");
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for row in &preview.rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str("<td>");
            html.push_str(&escape_html(cell));
            html.push_str("</td>");
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>");
    html
}

fn download_link(csv: &[u8]) -> String {
    let encoded = STANDARD.encode(csv);
    format!(
        r#"<a class="download-button" href="data:text/csv;base64,{encoded}" download="clustered_customers.csv">⬇️ Download CSV</a>"#
    )
}

/// The required-column list formatted the way the banner quotes it:
/// `['Annual Income (k$)', 'Spending Score (1-100)']`.
pub fn python_list<S: AsRef<str>>(items: &[S]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|item| format!("'{}'", item.as_ref()))
        .collect();
    format!("[{}]", quoted.join(", "))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
