//! Builders for synthetic images, shared with the integration tests.

mod deps {
    pub use crate::{
        file::parser::encode_compressed_uint,
        metadata::{
            tables::{schema::columns, CodedIndexType, HeapSizes, TableId, TableInfo},
            token::Token,
        },
    };
}


pub use image::*;
pub use tables::*;
