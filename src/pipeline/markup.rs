//! Table rendering: [`Table`] → styled HTML markup.
//!
//! The output must survive being written to a lone `.html` file and handed
//! to an external rasteriser, so the stylesheet is inlined ahead of the
//! table and nothing references external assets. Rendering is deterministic:
//! the same table always yields the same bytes.

use crate::error::ReportError;
use crate::table::{Cell, Table};
use std::fmt::Write as _;
use std::str::FromStr;

/// Stylesheet emitted ahead of every rendered table.
pub const TABLE_STYLE: &str = "<style>
    table, th, td {
        border: 1px solid #d3d3d3;
        border-collapse: collapse;
    }
    th {
        text-align: center;
        padding: 6px;
        background-color: #f9f9f9;
    }
    td {
        text-align: left;
        padding: 6px;
    }
    </style>
";

/// Markup formats the renderer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Styled HTML `<table>` markup.
    Html,
}

impl FromStr for TableFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(TableFormat::Html),
            _ => Err(ReportError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

/// Render `table` in the named `format`.
///
/// * Missing cells render as empty cells.
/// * The top-left header cell is the column-index name, else the row-index
///   name, else empty.
///
/// # Errors
/// [`ReportError::UnsupportedFormat`] for anything other than `"html"`.
pub fn to_markup(table: &Table, format: &str) -> Result<String, ReportError> {
    match format.parse::<TableFormat>()? {
        TableFormat::Html => Ok(render_html(table)),
    }
}

/// Text for the top-left header cell.
pub fn corner_label(table: &Table) -> &str {
    table
        .column_name()
        .or_else(|| table.row_name())
        .unwrap_or("")
}

fn render_html(table: &Table) -> String {
    let mut out = String::with_capacity(TABLE_STYLE.len() + 64 * (table.shape().0 + 1));
    out.push_str(TABLE_STYLE);
    out.push_str("<table>\n<thead>\n<tr>");
    let _ = write!(out, "<th>{}</th>", escape(corner_label(table)));
    for column in table.columns() {
        let _ = write!(out, "<th>{}</th>", escape(column));
    }
    out.push_str("</tr>\n</thead>\n<tbody>\n");

    for (label, cells) in table.rows() {
        out.push_str("<tr>");
        let _ = write!(out, "<td>{}</td>", escape(label));
        for cell in cells {
            let _ = write!(out, "<td>{}</td>", escape(&display_cell(cell)));
        }
        out.push_str("</tr>\n");
    }

    out.push_str("</tbody>\n</table>");
    out
}

fn display_cell(cell: &Cell) -> String {
    match cell {
        Cell::Missing => String::new(),
        present => present.to_string(),
    }
}

/// Minimal HTML escaping for text content.
pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Series;

    fn one_row(column_name: Option<&str>, row_name: Option<&str>) -> Table {
        let s = Series::from_pairs([("a", Cell::number(1.0))]);
        let mut t = Table::stack([("units", &s)]).unwrap();
        if let Some(c) = column_name {
            t = t.with_column_name(c);
        }
        if let Some(r) = row_name {
            t = t.with_row_name(r);
        }
        t
    }

    fn first_header(html: &str) -> &str {
        let start = html.find("<th>").unwrap() + "<th>".len();
        let end = start + html[start..].find("</th>").unwrap();
        &html[start..end]
    }

    #[test]
    fn corner_prefers_column_name() {
        let html = to_markup(&one_row(Some("skill"), None), "html").unwrap();
        assert_eq!(first_header(&html), "skill");

        let html = to_markup(&one_row(Some("skill"), Some("student")), "html").unwrap();
        assert_eq!(first_header(&html), "skill");
    }

    #[test]
    fn corner_falls_back_to_row_name_then_empty() {
        let html = to_markup(&one_row(None, Some("week")), "html").unwrap();
        assert_eq!(first_header(&html), "week");

        let html = to_markup(&one_row(None, None), "html").unwrap();
        assert_eq!(first_header(&html), "");
    }

    #[test]
    fn missing_cells_render_empty() {
        let s = Series::from_pairs([
            ("1", Cell::number(3.0)),
            ("2", Cell::Missing),
            ("3", Cell::number(5.0)),
        ]);
        let t = Table::stack([("units", &s)]).unwrap();
        let html = to_markup(&t, "html").unwrap();

        assert!(html.contains("<tr><td>units</td><td>3</td><td></td><td>5</td></tr>"), "{html}");
        for token in ["nan", "NaN", "NA", "None", "null"] {
            assert!(!html.contains(token), "leaked {token}: {html}");
        }
    }

    #[test]
    fn style_block_is_inlined_first() {
        let html = to_markup(&one_row(None, None), "HTML").unwrap();
        assert!(html.starts_with("<style>"));
        assert!(html.contains("background-color: #f9f9f9;"));
        assert!(!html.contains("<link"));
        assert!(html.ends_with("</table>"));
    }

    #[test]
    fn unsupported_format_is_an_error() {
        let err = to_markup(&one_row(None, None), "latex").unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedFormat { format } if format == "latex"));
    }

    #[test]
    fn labels_are_escaped() {
        let s = Series::from_pairs([("<b>", Cell::text("R&D"))]);
        let t = Table::stack([("x", &s)]).unwrap();
        let html = to_markup(&t, "html").unwrap();
        assert!(html.contains("<th>&lt;b&gt;</th>"));
        assert!(html.contains("<td>R&amp;D</td>"));
    }
}
