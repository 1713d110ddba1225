//! Synthetic images for the integration tests, built by the same builders the unit tests use.
#![allow(dead_code)]

mod deps {
    pub use clrmap::{
        file::parser::encode_compressed_uint,
        metadata::{
            tables::{schema::columns, CodedIndexType, HeapSizes, TableId, TableInfo},
            token::Token,
        },
    };
}

#[path = "../../src/test/image.rs"]
mod image;
#[path = "../../src/test/tables.rs"]
mod tables;

pub use image::*;
pub use tables::*;

use std::path::{Path, PathBuf};

/// Write `data` as `name` into `dir` and return its path
pub fn write_image(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}
