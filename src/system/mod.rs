// src/system/mod.rs

pub mod archive;
pub mod download;
