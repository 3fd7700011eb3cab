use std::io::{Read as _, Write as _};

use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;

/// Decompress a zlib (RFC 1950) stream, the format UTF-Grid blobs are stored in.
pub fn decode_zlib(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

pub fn encode_zlib(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn decode_gzip(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

/// Some tile generators gzip grid blobs instead of using plain zlib, so sniff the magic bytes.
pub fn decode_deflate_stream(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    if data.starts_with(b"\x1f\x8b") {
        decode_gzip(data)
    } else {
        decode_zlib(data)
    }
}
