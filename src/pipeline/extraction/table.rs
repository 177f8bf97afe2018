//! Row/cell views over the HTML and pipe tables found in OCR markdown.

use std::sync::LazyLock;

use regex::Regex;

static HTML_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)(?:</tr>|$)").unwrap());

static HTML_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<t[dh][^>]*>(.*?)</t[dh]>").unwrap());

static INNER_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

static PIPE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\|?[\s:|-]*-{3,}[\s:|-]*\|?$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub cells: Vec<String>,
}

impl TableRow {
    fn new(cells: Vec<String>) -> Option<Self> {
        (!cells.is_empty()).then_some(Self { cells })
    }
}

/// Rows of every HTML table. Text without `<tr>` is read one line per row,
/// so bare `<td>..</td><td>..</td>` fragments still parse.
pub fn html_rows(text: &str) -> Vec<TableRow> {
    let has_tr = text.to_ascii_lowercase().contains("<tr");
    let chunks: Vec<&str> = if has_tr {
        HTML_ROW
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    } else {
        text.lines().filter(|l| l.to_ascii_lowercase().contains("<td")).collect()
    };

    chunks
        .into_iter()
        .filter_map(|chunk| {
            let cells = HTML_CELL
                .captures_iter(chunk)
                .filter_map(|c| c.get(1))
                .map(|m| cell_text(m.as_str()))
                .collect();
            TableRow::new(cells)
        })
        .collect()
}

/// Rows of every markdown pipe table, separator rows skipped.
pub fn pipe_rows(text: &str) -> Vec<TableRow> {
    text.lines()
        .map(str::trim)
        .filter(|l| l.starts_with('|') && l.len() > 1)
        .filter(|l| !PIPE_SEPARATOR.is_match(l))
        .filter_map(|l| {
            let inner = l.trim_start_matches('|').trim_end_matches('|');
            TableRow::new(inner.split('|').map(cell_text).collect())
        })
        .collect()
}

fn cell_text(raw: &str) -> String {
    INNER_TAG.replace_all(raw, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_html_rows() {
        let md = "<table><tr><td>Hearing</td><td>[x]</td><td>Normal</td></tr>\n<tr><td>Bloods</td><td>[ ]</td><td>N/A</td></tr></table>";
        let rows = html_rows(md);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells, vec!["Hearing", "[x]", "Normal"]);
        assert_eq!(rows[1].cells[1], "[ ]");
    }

    #[test]
    fn bare_cells_without_tr() {
        let rows = html_rows("<td>Hearing</td><td>[x]</td><td>Normal</td>");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cells.len(), 3);
    }

    #[test]
    fn nested_tags_are_stripped() {
        let rows = html_rows("<tr><td><b>X-Ray</b></td><td>[x]</td></tr>");
        assert_eq!(rows[0].cells[0], "X-Ray");
    }

    #[test]
    fn parses_pipe_rows_and_skips_separator() {
        let md = "| Test | Done | Result |\n|------|:----:|--------|\n| Hearing | [x] | Normal |";
        let rows = pipe_rows(md);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].cells, vec!["Hearing", "[x]", "Normal"]);
    }

    #[test]
    fn no_tables() {
        assert!(html_rows("plain text").is_empty());
        assert!(pipe_rows("plain text").is_empty());
    }
}
