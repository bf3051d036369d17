use std::path::Path;

use anyhow::{bail, Context};
use cilmeta::metadata::{image::MetadataImage, writer::MetadataWriter};
use serde::Serialize;

use crate::{app::GlobalOptions, commands::common::load_input, output::print_output};

#[derive(Debug, Serialize)]
struct RoundtripOutput {
    mode: &'static str,
    input_size: usize,
    output_size: usize,
    identical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_difference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    written_to: Option<String>,
}

/// End of the last stream: the part of the input the writer reproduces
fn metadata_extent(image: &MetadataImage<'_>) -> usize {
    image
        .root()
        .stream_headers
        .iter()
        .map(|header| header.offset as usize + header.size as usize)
        .max()
        .unwrap_or(0)
        .min(image.data().len())
}

fn first_difference(left: &[u8], right: &[u8]) -> Option<usize> {
    left.iter()
        .zip(right)
        .position(|(a, b)| a != b)
        .or_else(|| (left.len() != right.len()).then(|| left.len().min(right.len())))
}

pub fn run(
    path: &Path,
    output_path: Option<&Path>,
    rewrite: bool,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let input = load_input(path)?;
    let image = input.image(opts)?;

    let (mode, expected, emitted) = if rewrite {
        let emitted = MetadataWriter::from_image(&image)
            .and_then(MetadataWriter::write)
            .context("failed to rewrite metadata")?;
        ("rewrite", &image.data()[..metadata_extent(&image)], emitted)
    } else {
        let emitted = image.to_bytes().context("failed to re-encode metadata")?;
        ("re-encode", image.data(), emitted)
    };

    let difference = first_difference(expected, &emitted);
    log::debug!(
        "{mode}: {} bytes in, {} bytes out",
        expected.len(),
        emitted.len()
    );

    if let Some(target) = output_path {
        std::fs::write(target, &emitted)
            .with_context(|| format!("failed to write {}", target.display()))?;
    }

    let output = RoundtripOutput {
        mode,
        input_size: expected.len(),
        output_size: emitted.len(),
        identical: difference.is_none(),
        first_difference: difference.map(|offset| format!("0x{offset:x}")),
        written_to: output_path.map(|target| target.display().to_string()),
    };

    print_output(&output, opts, |out| {
        println!("Mode:    {}", out.mode);
        println!("Input:   {} bytes", out.input_size);
        println!("Output:  {} bytes", out.output_size);
        match &out.first_difference {
            None => println!("Result:  identical"),
            Some(offset) => println!("Result:  differs at {offset}"),
        }
        if let Some(target) = &out.written_to {
            println!("Written: {target}");
        }
    })?;

    if let Some(offset) = difference {
        bail!("re-emitted metadata differs from the input at 0x{offset:x}");
    }
    Ok(())
}
