#![no_main]

use cilmeta::metadata::signatures::{
    encode_method_signature, parse_local_var_signature, parse_method_signature,
    parse_type_spec_signature,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(method) = parse_method_signature(data) {
        let _ = encode_method_signature(&method);
    }
    let _ = parse_local_var_signature(data);
    let _ = parse_type_spec_signature(data);
});
