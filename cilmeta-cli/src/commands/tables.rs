use std::path::Path;

use anyhow::{bail, Context};
use cilmeta::metadata::{
    image::MetadataImage,
    tables::{Column, ColumnKind, MetadataTable, RowRef, TableId},
    token::Token,
};
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::{
    app::GlobalOptions,
    commands::common::load_input,
    output::{print_output, print_table},
};

#[derive(Debug, Serialize)]
struct TableEntry {
    table: String,
    rows: u32,
    sorted: bool,
}

#[derive(Debug, Serialize)]
struct TablesOutput {
    tables: Vec<TableEntry>,
}

#[derive(Debug, Serialize)]
struct TableDetailOutput {
    table: String,
    row_count: u32,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn parse_table(name: &str) -> anyhow::Result<TableId> {
    let lower = name.to_lowercase();
    TableId::iter()
        .find(|table| table.to_string().to_lowercase() == lower)
        .with_context(|| format!("unknown table '{name}'"))
}

fn format_reference(token: Token) -> String {
    if token.is_null() {
        return "null".to_string();
    }
    match TableId::from_token(token) {
        Some(table) => format!("{table}[{}]", token.row()),
        None => token.to_string(),
    }
}

fn format_cell(image: &MetadataImage<'_>, row: &RowRef<'_>, index: usize, column: &Column) -> String {
    let value = row.get(index);
    match column.kind {
        ColumnKind::U8 | ColumnKind::U16 | ColumnKind::U32
            if column.name.ends_with("Flags") || column.name == "RVA" =>
        {
            format!("0x{value:x}")
        }
        ColumnKind::U8 | ColumnKind::U16 | ColumnKind::U32 => value.to_string(),
        ColumnKind::String => image
            .strings()
            .and_then(|strings| row.string(index, strings).ok())
            .map_or_else(|| format!("string@{value}"), str::to_string),
        ColumnKind::Blob if value == 0 => "blob[0]".to_string(),
        ColumnKind::Blob => image
            .blobs()
            .and_then(|blobs| row.blob(index, blobs).ok())
            .map_or_else(
                || format!("blob@{value}"),
                |blob| format!("blob[{} bytes]", blob.len()),
            ),
        ColumnKind::Guid => match image.guids().map(|guids| row.guid(index, guids)) {
            Some(Ok(Some(guid))) => guid.to_string(),
            Some(Ok(None)) => "null".to_string(),
            _ => format!("guid#{value}"),
        },
        ColumnKind::Table(table) => format_reference(Token::from_parts(table, value)),
        ColumnKind::Coded(_) => format_reference(Token::new(value)),
    }
}

fn table_detail(image: &MetadataImage<'_>, table: &MetadataTable) -> TableDetailOutput {
    let columns = table.id().columns();
    let mut names = vec!["RID".to_string()];
    names.extend(columns.iter().map(|column| column.name.to_string()));

    let rows = table
        .iter()
        .map(|row| {
            let mut cells = vec![row.rid().to_string()];
            cells.extend(
                columns
                    .iter()
                    .enumerate()
                    .map(|(index, column)| format_cell(image, &row, index, column)),
            );
            cells
        })
        .collect();

    TableDetailOutput {
        table: table.id().to_string(),
        row_count: table.row_count(),
        columns: names,
        rows,
    }
}

pub fn run(path: &Path, table_filter: Option<&str>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let input = load_input(path)?;
    let image = input.image(opts)?;

    if let Some(filter) = table_filter {
        let id = parse_table(filter)?;
        let Some(table) = image.table(id) else {
            bail!("the {id} table is not present");
        };

        let detail = table_detail(&image, table);
        print_output(&detail, opts, |d| {
            println!("{} table ({} rows):\n", d.table, d.row_count);
            let columns: Vec<&str> = d.columns.iter().map(String::as_str).collect();
            print_table("", &columns, d.rows.clone());
        })
    } else {
        let sorted = image.tables().header().sorted;
        let tables: Vec<TableEntry> = image
            .tables()
            .tables()
            .map(|table| TableEntry {
                table: table.id().to_string(),
                rows: table.row_count(),
                sorted: sorted & table.id().bit() != 0,
            })
            .collect();

        if tables.is_empty() {
            bail!("no metadata tables present");
        }

        let output = TablesOutput { tables };
        print_output(&output, opts, |out| {
            let rows = out
                .tables
                .iter()
                .map(|entry| {
                    vec![
                        entry.table.clone(),
                        entry.rows.to_string(),
                        if entry.sorted { "yes" } else { "" }.to_string(),
                    ]
                })
                .collect();
            print_table("", &["Table", "Rows", "Sorted"], rows);
        })
    }
}
