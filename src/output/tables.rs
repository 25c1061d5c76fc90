use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::history::ParamHistoryRow;
use crate::params::{ParameterTable, NOT_DEFINED};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Highlights values that differ from `baseline` and greys out missing ones.
pub fn value_cell(value: &str, baseline: Option<&str>) -> Cell {
    if value == NOT_DEFINED {
        Cell::new(value).fg(TableColor::DarkGrey)
    } else if baseline.is_some_and(|base| base != value) {
        Cell::new(value).fg(TableColor::Yellow)
    } else {
        Cell::new(value)
    }
}

/// One row per parameter, one column per build.
pub fn parameter_table(params: &ParameterTable) -> Table {
    let mut table = create_table();
    let mut header = vec![Cell::new("Parameter")];
    header.extend(params.columns.iter().map(Cell::new));
    table.set_header(header);

    for row in &params.rows {
        let baseline = row.values.first().map(String::as_str);
        let mut cells = vec![Cell::new(&row.name)];
        cells.extend(row.values.iter().map(|value| value_cell(value, baseline)));
        table.add_row(cells);
    }
    table
}

/// One row per build, labelled by `labels`, one column per requested
/// parameter. Values that changed since the next older build are highlighted.
pub fn param_history_table(names: &[String], rows: &[ParamHistoryRow], labels: &[String]) -> Table {
    let mut table = create_table();
    let mut header = vec![Cell::new("Build")];
    header.extend(names.iter().map(Cell::new));
    table.set_header(header);

    for (i, row) in rows.iter().enumerate() {
        let older = rows.get(i + 1);
        let label = labels.get(i).cloned().unwrap_or_else(|| row.build.id());
        let mut cells = vec![Cell::new(label)];
        cells.extend(row.values.iter().enumerate().map(|(column, value)| {
            let baseline = older.and_then(|older| older.values.get(column)).map(String::as_str);
            value_cell(value, baseline)
        }));
        table.add_row(cells);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::Build;
    use crate::jenkins::fake::FakeJenkins;
    use crate::params::ParameterSet;
    use std::sync::Arc;

    #[test]
    fn parameter_table_has_a_column_per_build() {
        let sets: Vec<ParameterSet> = vec![
            [("A".to_string(), "1".to_string())].into_iter().collect(),
            [("A".to_string(), "2".to_string())].into_iter().collect(),
        ];
        let params = ParameterTable::from_sets(vec!["job#1".into(), "job#2".into()], &sets);

        let rendered = parameter_table(&params).to_string();

        assert!(rendered.contains("Parameter"));
        assert!(rendered.contains("job#1"));
        assert!(rendered.contains("job#2"));
        assert_eq!(parameter_table(&params).row_iter().count(), 1);
    }

    #[test]
    fn param_history_table_lists_builds_in_order() {
        let fake = Arc::new(FakeJenkins::new());
        let rows = vec![
            ParamHistoryRow {
                build: Arc::new(Build::new(fake.clone(), "deploy", 2)),
                values: vec!["b".into()],
            },
            ParamHistoryRow {
                build: Arc::new(Build::new(fake, "deploy", 1)),
                values: vec![NOT_DEFINED.into()],
            },
        ];

        let rendered = param_history_table(&["BRANCH".to_string()], &rows, &[]).to_string();

        let second = rendered.find("deploy#2").unwrap();
        let first = rendered.find("deploy#1").unwrap();
        assert!(second < first);
        assert!(rendered.contains("BRANCH"));
    }

    #[test]
    fn param_history_table_uses_given_labels() {
        let fake = Arc::new(FakeJenkins::new());
        let rows = vec![ParamHistoryRow {
            build: Arc::new(Build::new(fake, "deploy", 2)),
            values: vec!["b".into()],
        }];

        let rendered =
            param_history_table(&["BRANCH".to_string()], &rows, &["deploy 2 SUCCESS".to_string()])
                .to_string();

        assert!(rendered.contains("deploy 2 SUCCESS"));
        assert!(!rendered.contains("deploy#2"));
    }
}
