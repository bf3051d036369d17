use std::path::Path;

use anyhow::{bail, Context};
use cilmeta::metadata::image::MetadataImage;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_input,
    output::{print_output, print_table},
};

/// Bytes shown per blob in the listing
const BLOB_PREVIEW: usize = 32;

#[derive(Debug, Serialize)]
struct HeapSummary {
    name: String,
    size: usize,
    entries: usize,
}

#[derive(Debug, Serialize)]
struct HeapsSummaryOutput {
    heaps: Vec<HeapSummary>,
}

#[derive(Debug, Serialize)]
struct StringEntry {
    offset: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct StringsOutput {
    entries: Vec<StringEntry>,
}

#[derive(Debug, Serialize)]
struct UserStringEntry {
    offset: String,
    marker: u8,
    value: String,
}

#[derive(Debug, Serialize)]
struct UserStringsOutput {
    entries: Vec<UserStringEntry>,
}

#[derive(Debug, Serialize)]
struct GuidEntry {
    index: usize,
    guid: String,
}

#[derive(Debug, Serialize)]
struct GuidsOutput {
    entries: Vec<GuidEntry>,
}

#[derive(Debug, Serialize)]
struct BlobEntry {
    offset: String,
    size: usize,
    preview: String,
}

#[derive(Debug, Serialize)]
struct BlobOutput {
    entries: Vec<BlobEntry>,
}

pub fn run(path: &Path, heap_filter: Option<&str>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let input = load_input(path)?;
    let image = input.image(opts)?;

    match heap_filter.map(str::to_lowercase).as_deref() {
        None => print_summary(&image, opts),
        Some("strings") => dump_strings(&image, opts),
        Some("userstrings" | "us") => dump_userstrings(&image, opts),
        Some("guid" | "guids") => dump_guids(&image, opts),
        Some("blob") => dump_blob(&image, opts),
        Some(other) => bail!("unknown heap '{other}' (expected: strings, userstrings, guid, blob)"),
    }
}

fn print_summary(image: &MetadataImage<'_>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let mut heaps = Vec::new();
    if let Some(strings) = image.strings() {
        heaps.push(HeapSummary {
            name: "#Strings".to_string(),
            size: strings.len(),
            entries: strings.iter().count(),
        });
    }
    if let Some(us) = image.user_strings() {
        heaps.push(HeapSummary {
            name: "#US".to_string(),
            size: us.len(),
            entries: us.iter().count(),
        });
    }
    if let Some(guids) = image.guids() {
        heaps.push(HeapSummary {
            name: "#GUID".to_string(),
            size: guids.data().len(),
            entries: guids.count(),
        });
    }
    if let Some(blob) = image.blobs() {
        heaps.push(HeapSummary {
            name: "#Blob".to_string(),
            size: blob.len(),
            entries: blob.iter().count(),
        });
    }

    let output = HeapsSummaryOutput { heaps };
    print_output(&output, opts, |out| {
        let rows = out
            .heaps
            .iter()
            .map(|heap| vec![heap.name.clone(), heap.size.to_string(), heap.entries.to_string()])
            .collect();
        print_table("", &["Heap", "Size", "Entries"], rows);
    })
}

fn dump_strings(image: &MetadataImage<'_>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let strings = image.strings().context("no #Strings heap")?;

    let entries = strings
        .iter()
        .map(|(offset, value)| StringEntry {
            offset: format!("0x{offset:06x}"),
            value: value.to_string(),
        })
        .collect();

    let output = StringsOutput { entries };
    print_output(&output, opts, |out| {
        let rows = out
            .entries
            .iter()
            .map(|entry| vec![entry.offset.clone(), entry.value.clone()])
            .collect();
        print_table("", &["Offset", "Value"], rows);
    })
}

fn dump_userstrings(image: &MetadataImage<'_>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let us = image.user_strings().context("no #US heap")?;

    let entries = us
        .iter()
        .map(|(offset, entry)| UserStringEntry {
            offset: format!("0x{offset:06x}"),
            marker: entry.marker,
            value: entry.value.to_string_lossy(),
        })
        .collect();

    let output = UserStringsOutput { entries };
    print_output(&output, opts, |out| {
        let rows = out
            .entries
            .iter()
            .map(|entry| vec![entry.offset.clone(), entry.marker.to_string(), entry.value.clone()])
            .collect();
        print_table("", &["Offset", "Marker", "Value"], rows);
    })
}

fn dump_guids(image: &MetadataImage<'_>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let guids = image.guids().context("no #GUID heap")?;

    let entries = guids
        .iter()
        .map(|(index, guid)| GuidEntry {
            index,
            guid: guid.to_string(),
        })
        .collect();

    let output = GuidsOutput { entries };
    print_output(&output, opts, |out| {
        let rows = out
            .entries
            .iter()
            .map(|entry| vec![entry.index.to_string(), entry.guid.clone()])
            .collect();
        print_table("", &["Index", "GUID"], rows);
    })
}

fn dump_blob(image: &MetadataImage<'_>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let blob = image.blobs().context("no #Blob heap")?;

    let entries = blob
        .iter()
        .map(|(offset, data)| {
            let shown = &data[..data.len().min(BLOB_PREVIEW)];
            let hex = shown
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ");
            let suffix = if data.len() > BLOB_PREVIEW { " ..." } else { "" };
            BlobEntry {
                offset: format!("0x{offset:06x}"),
                size: data.len(),
                preview: format!("{hex}{suffix}"),
            }
        })
        .collect();

    let output = BlobOutput { entries };
    print_output(&output, opts, |out| {
        let rows = out
            .entries
            .iter()
            .map(|entry| vec![entry.offset.clone(), entry.size.to_string(), entry.preview.clone()])
            .collect();
        print_table("", &["Offset", "Size", "Data"], rows);
    })
}
