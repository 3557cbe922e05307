//! HTML to markdown conversion.

use scraper::{ElementRef, Html, Selector};

/// Convert an HTML fragment to markdown.
///
/// Links, images and code spans are kept, tables become GFM pipe tables and
/// no line wrapping is applied. Falls back to the fragment's plain text if
/// conversion fails.
pub fn html_to_markdown(html: &str) -> String {
    let (html, tables) = extract_tables(html);
    let mut markdown = htmd::convert(&html).unwrap_or_else(|_| html_to_text(&html));
    for (i, table) in tables.iter().enumerate() {
        markdown = markdown.replace(&table_marker(i), table);
    }
    markdown.trim().to_string()
}

fn table_marker(i: usize) -> String {
    format!("BIZSUPTABLE{}END", i)
}

/// Swap every outermost table for a marker paragraph and render the tables
/// separately.
fn extract_tables(html: &str) -> (String, Vec<String>) {
    let Ok(table_sel) = Selector::parse("table") else {
        return (html.to_string(), Vec::new());
    };
    let fragment = Html::parse_fragment(html);
    let outermost: Vec<ElementRef<'_>> = fragment
        .select(&table_sel)
        .filter(|table| enclosing_table(*table).is_none())
        .collect();
    if outermost.is_empty() {
        return (html.to_string(), Vec::new());
    }

    let mut serialized = fragment.root_element().inner_html();
    let mut tables = Vec::new();
    for table in outermost {
        let markup = table.html();
        let Some(rendered) = render_table(table) else {
            continue;
        };
        let marker = format!("<p>{}</p>", table_marker(tables.len()));
        serialized = serialized.replacen(&markup, &marker, 1);
        tables.push(rendered);
    }
    (serialized, tables)
}

fn enclosing_table(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
}

/// GFM pipe table; the first row is the header. None for a table without
/// cells.
fn render_table(table: ElementRef<'_>) -> Option<String> {
    let row_sel = Selector::parse("tr").ok()?;
    let rows: Vec<Vec<String>> = table
        .select(&row_sel)
        .filter(|row| enclosing_table(*row).map(|t| t.id()) == Some(table.id()))
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "th" | "td"))
                .map(render_cell)
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    let width = rows.iter().map(Vec::len).max()?;
    let line = |cells: &[String]| {
        let mut padded = cells.to_vec();
        padded.resize(width, String::new());
        format!("| {} |", padded.join(" | "))
    };

    let divider = vec!["---".to_string(); width];
    let mut out = vec![line(rows[0].as_slice()), line(divider.as_slice())];
    out.extend(rows[1..].iter().map(|row| line(row.as_slice())));
    Some(out.join("\n"))
}

fn render_cell(cell: ElementRef<'_>) -> String {
    let inner = cell.inner_html();
    let markdown = htmd::convert(&inner).unwrap_or_else(|_| html_to_text(&inner));
    markdown
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

/// Plain text of an HTML fragment, one line per text run.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
