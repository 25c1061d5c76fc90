use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::params::{ParameterTable, NOT_DEFINED};

/// Writes any serializable value as JSON followed by a newline.
pub fn export_json<T: Serialize>(value: &T, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(output, "{}", json)?;
    Ok(())
}

/// Writes the parameter comparison as a self-contained HTML page.
///
/// Cells that differ from the first build's value are marked `changed`,
/// cells for builds that lack the parameter are marked `missing`.
pub fn export_html(table: &ParameterTable, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "<!DOCTYPE html>")?;
    writeln!(output, "<html lang=\"en\">")?;
    writeln!(output, "<head>")?;
    writeln!(output, "    <meta charset=\"UTF-8\">")?;
    writeln!(output, "    <title>Build parameters - {}</title>", escape_html(&table.columns.join(", ")))?;
    writeln!(output, "    <style>")?;
    writeln!(output, "        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; }}")?;
    writeln!(output, "        table {{ border-collapse: collapse; }}")?;
    writeln!(output, "        th, td {{ padding: 6px 12px; text-align: left; border-bottom: 1px solid #ddd; font-family: monospace; }}")?;
    writeln!(output, "        th {{ background: #335061; color: white; }}")?;
    writeln!(output, "        tr:nth-child(even) {{ background: #f8f9fa; }}")?;
    writeln!(output, "        .changed {{ color: #e67e22; font-weight: bold; }}")?;
    writeln!(output, "        .missing {{ color: #999; }}")?;
    writeln!(output, "    </style>")?;
    writeln!(output, "</head>")?;
    writeln!(output, "<body>")?;
    writeln!(output, "    <table>")?;
    writeln!(output, "        <thead>")?;
    writeln!(output, "            <tr>")?;
    writeln!(output, "                <th>Parameter</th>")?;
    for column in &table.columns {
        writeln!(output, "                <th>{}</th>", escape_html(column))?;
    }
    writeln!(output, "            </tr>")?;
    writeln!(output, "        </thead>")?;
    writeln!(output, "        <tbody>")?;

    for row in &table.rows {
        let first = row.values.first();
        writeln!(output, "            <tr>")?;
        writeln!(output, "                <td>{}</td>", escape_html(&row.name))?;
        for value in &row.values {
            let class = if value == NOT_DEFINED {
                " class=\"missing\""
            } else if Some(value) != first {
                " class=\"changed\""
            } else {
                ""
            };
            writeln!(output, "                <td{}>{}</td>", class, escape_html(value))?;
        }
        writeln!(output, "            </tr>")?;
    }

    writeln!(output, "        </tbody>")?;
    writeln!(output, "    </table>")?;
    writeln!(output, "</body>")?;
    writeln!(output, "</html>")?;

    Ok(())
}

/// Writes [`export_html`] output to `path`, replacing any existing file.
pub fn write_html(table: &ParameterTable, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create HTML file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    export_html(table, &mut writer)?;
    writer
        .flush()
        .with_context(|| format!("Failed to write HTML file: {}", path.display()))?;
    Ok(())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSet;
    use serde_json::json;

    fn create_test_table() -> ParameterTable {
        let first: ParameterSet = [("BRANCH", "main"), ("FLAGS", "<fast>")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let second: ParameterSet = [("BRANCH", "release & hotfix")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ParameterTable::from_sets(vec!["deploy#1".into(), "deploy#2".into()], &[first, second])
    }

    #[test]
    fn test_export_json() {
        let mut output = Vec::new();
        export_json(&json!({"status": "SUCCESS"}), false, &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "{\"status\":\"SUCCESS\"}\n");
    }

    #[test]
    fn test_export_json_pretty() {
        let mut output = Vec::new();
        export_json(&json!({"status": "SUCCESS"}), true, &mut output).unwrap();
        let json_str = String::from_utf8(output).unwrap();
        assert!(json_str.contains("\n  \"status\""));
    }

    #[test]
    fn test_export_html_structure() {
        let mut output = Vec::new();
        export_html(&create_test_table(), &mut output).unwrap();
        let html = String::from_utf8(output).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<th>deploy#1</th>"));
        assert!(html.contains("<th>deploy#2</th>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_export_html_escapes_and_marks_cells() {
        let mut output = Vec::new();
        export_html(&create_test_table(), &mut output).unwrap();
        let html = String::from_utf8(output).unwrap();

        assert!(html.contains("<td>&lt;fast&gt;</td>"));
        assert!(html.contains("<td class=\"changed\">release &amp; hotfix</td>"));
        assert!(html.contains("<td class=\"missing\">n/d</td>"));
    }

    #[test]
    fn test_write_html_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diff.html");

        write_html(&create_test_table(), &path).unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("BRANCH"));
    }

    #[test]
    fn test_write_html_to_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("diff.html");
        assert!(write_html(&create_test_table(), &path).is_err());
    }
}
