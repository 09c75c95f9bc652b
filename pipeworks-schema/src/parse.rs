//! Descriptor set decoding

use prost::Message;
use prost_types::FileDescriptorSet;
use std::fs;
use std::path::Path;

use crate::error::SchemaError;

/// Read a binary `FileDescriptorSet` as written by `protoc --descriptor_set_out`.
pub fn parse_descriptor_set_file<P: AsRef<Path>>(path: P) -> Result<FileDescriptorSet, SchemaError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| SchemaError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    parse_descriptor_set_bytes(&path.display().to_string(), &bytes)
}

pub fn parse_descriptor_set_bytes(
    source_name: &str,
    bytes: &[u8],
) -> Result<FileDescriptorSet, SchemaError> {
    FileDescriptorSet::decode(bytes).map_err(|e| SchemaError::Decode {
        source_name: source_name.to_string(),
        reason: e.to_string(),
    })
}
