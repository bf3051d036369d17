pub mod common;
pub mod heaps;
pub mod info;
pub mod roundtrip;
pub mod tables;
