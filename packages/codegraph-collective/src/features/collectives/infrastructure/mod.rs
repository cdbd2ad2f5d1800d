//! Built-in knowledge about external functions

pub mod ext_info;

pub use ext_info::{ext_info, is_memcpy_like, is_memset_like, ExtInfo};
