//! Built-in converter rendering the JSON document model to standalone HTML.

use std::fmt::Write as _;
use std::path::Path;

use tracing::debug;

use documint_core::Converter;
use documint_shared::{Block, Document, DocumintError, Paragraph, Result, Table};

/// Converts a [`Document`] stored as JSON into a self-contained `.html` file.
pub struct HtmlConverter;

impl Converter for HtmlConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let content = std::fs::read_to_string(input).map_err(|e| {
            DocumintError::Conversion(format!("cannot read {}: {e}", input.display()))
        })?;
        let document: Document = serde_json::from_str(&content).map_err(|e| {
            DocumintError::Conversion(format!("{} is not a document: {e}", input.display()))
        })?;

        let title = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let html = render_html(&document, &title);

        std::fs::write(output, html).map_err(|e| {
            DocumintError::Conversion(format!("cannot write {}: {e}", output.display()))
        })?;
        debug!(output = %output.display(), "html written");
        Ok(())
    }

    fn extension(&self) -> &str {
        "html"
    }
}

/// Render `document` as an HTML page.
pub fn render_html(document: &Document, title: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape(title));
    html.push_str("</head>\n<body>\n");

    for block in &document.blocks {
        match block {
            Block::Paragraph(p) => {
                write_paragraph(&mut html, p);
                html.push('\n');
            }
            Block::Table(t) => write_table(&mut html, t),
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn write_paragraph(html: &mut String, paragraph: &Paragraph) {
    html.push_str("<p>");
    for run in &paragraph.runs {
        let text = escape(&run.text);
        match (run.bold, run.italic) {
            (true, true) => {
                let _ = write!(html, "<strong><em>{text}</em></strong>");
            }
            (true, false) => {
                let _ = write!(html, "<strong>{text}</strong>");
            }
            (false, true) => {
                let _ = write!(html, "<em>{text}</em>");
            }
            (false, false) => html.push_str(&text),
        }
    }
    html.push_str("</p>");
}

fn write_table(html: &mut String, table: &Table) {
    html.push_str("<table>\n");
    for row in &table.rows {
        html.push_str("<tr>");
        for cell in &row.cells {
            html.push_str("<td>");
            for paragraph in &cell.paragraphs {
                write_paragraph(html, paragraph);
            }
            html.push_str("</td>");
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use documint_shared::{Run, TableCell, TableRow};

    #[test]
    fn formatting_runs_map_to_tags() {
        let document = Document {
            blocks: vec![Block::Paragraph(Paragraph {
                runs: vec![
                    Run {
                        text: "Admit".into(),
                        bold: true,
                        italic: false,
                    },
                    Run::plain(" card for "),
                    Run {
                        text: "Ada".into(),
                        bold: false,
                        italic: true,
                    },
                ],
            })],
        };

        let html = render_html(&document, "Admit_42");
        assert!(html.contains("<title>Admit_42</title>"));
        assert!(html.contains("<p><strong>Admit</strong> card for <em>Ada</em></p>"));
    }

    #[test]
    fn text_is_escaped() {
        let document = Document {
            blocks: vec![Block::Paragraph(Paragraph::plain("<b>Tom & \"Jerry\"</b>"))],
        };
        let html = render_html(&document, "x");
        assert!(html.contains("<p>&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;</p>"));
    }

    #[test]
    fn tables_render_as_rows_of_cells() {
        let document = Document {
            blocks: vec![Block::Table(Table {
                rows: vec![TableRow {
                    cells: vec![
                        TableCell {
                            paragraphs: vec![Paragraph::plain("Roll No")],
                        },
                        TableCell {
                            paragraphs: vec![Paragraph::plain("42")],
                        },
                    ],
                }],
            })],
        };
        let html = render_html(&document, "x");
        assert!(html.contains("<table>\n<tr><td><p>Roll No</p></td><td><p>42</p></td></tr>\n</table>"));
    }

    #[test]
    fn converts_json_artifact_to_html_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Admit_42.json");
        let output = dir.path().join("Admit_42.html");
        std::fs::write(&input, r#"{"blocks":[{"type":"paragraph","runs":[{"text":"Ada"}]}]}"#)
            .unwrap();

        HtmlConverter.convert(&input, &output).unwrap();

        let html = std::fs::read_to_string(&output).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<p>Ada</p>"));
    }

    #[test]
    fn unreadable_artifact_is_a_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.json");
        std::fs::write(&input, "not json").unwrap();

        let err = HtmlConverter
            .convert(&input, &dir.path().join("broken.html"))
            .unwrap_err();
        assert!(matches!(err, DocumintError::Conversion(_)));
    }
}
