#![no_main]

use cilmeta::metadata::image::MetadataImage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = MetadataImage::read(data) {
        let _ = image.to_bytes();
    }
});
