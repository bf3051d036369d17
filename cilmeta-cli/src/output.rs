use comfy_table::{presets, CellAlignment, ContentArrangement, Table};
use serde::Serialize;

use crate::app::GlobalOptions;

/// Print `data` as JSON (if `--json`) or call `display_fn` for human-readable output.
pub fn print_output<T: Serialize>(
    data: &T,
    opts: &GlobalOptions,
    display_fn: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if opts.json {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else {
        display_fn(data);
    }
    Ok(())
}

/// Print borderless columns, each line prefixed with `indent`.
///
/// Columns holding only decimal numbers are right-aligned.
pub fn print_table(indent: &str, headers: &[&str], rows: Vec<Vec<String>>) {
    for line in render_table(headers, rows).lines() {
        println!("{indent}{line}");
    }
}

fn render_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().copied());

    let last = headers.len().saturating_sub(1);
    for index in 0..headers.len() {
        let numeric = rows.iter().all(|row| {
            row.get(index)
                .is_none_or(|cell| !cell.is_empty() && cell.bytes().all(|b| b.is_ascii_digit()))
        });
        if let Some(column) = table.column_mut(index) {
            if numeric && !rows.is_empty() {
                column.set_cell_alignment(CellAlignment::Right);
            }
            column.set_padding((u16::from(index != 0), u16::from(index != last)));
        }
    }

    for row in rows {
        table.add_row(row);
    }
    table
        .to_string()
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn numbers_align_right() {
        let rendered = render_table(
            &["Heap", "Size", "Offset"],
            vec![row(&["#Strings", "1024", "0x6c"]), row(&["#GUID", "16", "0x46c"])],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "#Strings  1024  0x6c");
        assert_eq!(lines[2], "#GUID       16  0x46c");
    }

    #[test]
    fn empty_cells_keep_text_alignment() {
        let rendered = render_table(
            &["Table", "Sorted"],
            vec![row(&["TypeDef", ""]), row(&["Field", "yes"])],
        );
        assert!(rendered.lines().all(|line| !line.ends_with(' ')));
        assert!(rendered.contains("Field    yes"));
    }
}
