use std::path::Path;

use cilmeta::metadata::{
    image::MetadataImage,
    tables::{module, TableId},
};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_input,
    output::{print_output, print_table},
};

#[derive(Debug, Serialize)]
pub struct MetadataInfo {
    pub root_offset: String,
    pub runtime_version: String,
    pub root_version: String,
    pub tables_version: String,
    pub heap_sizes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mvid: Option<String>,
    pub table_count: u32,
    pub total_rows: u64,
    pub streams: Vec<StreamInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdb: Option<PdbInfo>,
}

#[derive(Debug, Serialize)]
pub struct StreamInfo {
    pub name: String,
    pub offset: String,
    pub size: u32,
}

#[derive(Debug, Serialize)]
pub struct PdbInfo {
    pub id: String,
    pub entry_point: String,
    pub referenced_tables: usize,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn module_identity(image: &MetadataImage<'_>) -> (Option<String>, Option<String>) {
    let Some(row) = image.table(TableId::Module).and_then(|table| table.get(1)) else {
        return (None, None);
    };

    let name = image
        .strings()
        .and_then(|strings| row.string(module::NAME, strings).ok())
        .map(str::to_string);
    let mvid = image
        .guids()
        .and_then(|guids| row.guid(module::MVID, guids).ok().flatten())
        .map(|guid| guid.to_string());
    (name, mvid)
}

pub fn run(path: &Path, opts: &GlobalOptions) -> anyhow::Result<()> {
    let input = load_input(path)?;
    let image = input.image(opts)?;

    let root = image.root();
    let header = image.tables().header();
    let (module, mvid) = module_identity(&image);

    let heap_sizes = header
        .heap_sizes
        .iter_names()
        .map(|(name, _)| name.to_string())
        .collect();

    let output = MetadataInfo {
        root_offset: format!("0x{:x}", input.offset()),
        runtime_version: root.version.clone(),
        root_version: format!("{}.{}", root.major_version, root.minor_version),
        tables_version: format!("{}.{}", header.major_version, header.minor_version),
        heap_sizes,
        module,
        mvid,
        table_count: image.tables().table_count(),
        total_rows: image
            .tables()
            .tables()
            .map(|table| u64::from(table.row_count()))
            .sum(),
        streams: root
            .stream_headers
            .iter()
            .map(|stream| StreamInfo {
                name: stream.name.clone(),
                offset: format!("0x{:x}", stream.offset),
                size: stream.size,
            })
            .collect(),
        pdb: image.pdb().map(|pdb| PdbInfo {
            id: hex(&pdb.id),
            entry_point: pdb.entry_point.to_string(),
            referenced_tables: pdb.referenced_tables.count_ones() as usize,
        }),
    };

    print_output(&output, opts, |out| {
        println!("Runtime:        {}", out.runtime_version);
        println!("Root offset:    {}", out.root_offset);
        println!("Root version:   {}", out.root_version);
        println!("Tables version: {}", out.tables_version);
        if let Some(module) = &out.module {
            println!("Module:         {module}");
        }
        if let Some(mvid) = &out.mvid {
            println!("MVID:           {mvid}");
        }
        if out.heap_sizes.is_empty() {
            println!("Heap indexes:   2-byte");
        } else {
            println!("Heap indexes:   {}", out.heap_sizes.join(" | "));
        }
        println!("Tables:         {} ({} rows)", out.table_count, out.total_rows);

        if let Some(pdb) = &out.pdb {
            println!();
            println!("Portable PDB:");
            println!("  Id:           {}", pdb.id);
            println!("  Entry point:  {}", pdb.entry_point);
            println!("  Type tables:  {}", pdb.referenced_tables);
        }

        println!();
        println!("Streams:");
        let rows = out
            .streams
            .iter()
            .map(|stream| vec![stream.name.clone(), stream.offset.clone(), stream.size.to_string()])
            .collect();
        print_table("  ", &["Name", "Offset", "Size"], rows);
    })
}
