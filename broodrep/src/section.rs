//! Section framing and chunked decompression (spec component "SectionCodec").
//!
//! A replay section is framed as `expected_uncompressed_size: u32, chunk_count: u32`
//! followed by that many chunks. Each chunk is either copied verbatim (when its
//! declared length equals the remaining uncompressed size capped at
//! [`CHUNK_MAX`]) or run through the format's compression codec. The bit-exact
//! Huffman/back-reference decoding itself is delegated to the `explode` crate
//! (legacy PKWare DCL implode sections) or `flate2` (zlib sections on modern
//! clients) rather than reimplemented here — see DESIGN.md.

use std::io::Read;

use byteorder::{LittleEndian as LE, ReadBytesExt as _};

use crate::compression::{DecompressionConfig, SafeDecompressor};
use crate::{BroodrepError, ReplayFormat};

/// Maximum size of a single chunk's decompressed output.
pub(crate) const CHUNK_MAX: usize = 8192;

fn read_u32(bytes: &[u8], stage: &'static str) -> Result<(u32, &[u8]), BroodrepError> {
    if bytes.len() < 4 {
        return Err(BroodrepError::TruncatedInput { at: stage });
    }
    let (head, rest) = bytes.split_at(4);
    Ok((
        (&head[..]).read_u32::<LE>().expect("length checked above"),
        rest,
    ))
}

fn decompress_chunk(
    format: ReplayFormat,
    compressed: &[u8],
    config: DecompressionConfig,
) -> Result<Vec<u8>, BroodrepError> {
    let mut out = Vec::new();
    match format {
        ReplayFormat::Legacy => {
            let mut reader = SafeDecompressor::new(
                explode::ExplodeReader::new(compressed),
                config,
                Some(compressed.len() as u64),
            );
            reader.read_to_end(&mut out).map_err(|e| {
                BroodrepError::CorruptSection {
                    stage: "chunk",
                    detail: e.to_string(),
                }
            })?;
        }
        ReplayFormat::Modern121 => {
            let mut reader = SafeDecompressor::new(
                flate2::bufread::ZlibDecoder::new(compressed),
                config,
                Some(compressed.len() as u64),
            );
            reader.read_to_end(&mut out).map_err(|e| {
                BroodrepError::CorruptSection {
                    stage: "chunk",
                    detail: e.to_string(),
                }
            })?;
        }
    }
    if out.len() > CHUNK_MAX {
        return Err(BroodrepError::CorruptSection {
            stage: "chunk",
            detail: format!("decompressed chunk exceeds {CHUNK_MAX} bytes ({})", out.len()),
        });
    }
    Ok(out)
}

/// Reads one framed, chunked section from the front of `bytes` and returns
/// `(decompressed_payload, remaining_bytes)`.
pub(crate) fn read_section<'a>(
    bytes: &'a [u8],
    format: ReplayFormat,
    config: DecompressionConfig,
) -> Result<(Vec<u8>, &'a [u8]), BroodrepError> {
    let (expected_size, rest) = read_u32(bytes, "section.expected_size")?;
    let (chunk_count, mut rest) = read_u32(rest, "section.chunk_count")?;
    let expected_size = expected_size as usize;

    log::trace!(
        "decompressing section: expected={expected_size} chunks={chunk_count}"
    );

    let mut output = Vec::with_capacity(expected_size.min(64 * 1024 * 1024));
    for chunk_index in 0..chunk_count {
        let (chunk_len, after_len) = read_u32(rest, "section.chunk_len")?;
        let chunk_len = chunk_len as usize;
        if after_len.len() < chunk_len {
            return Err(BroodrepError::TruncatedInput {
                at: "section.chunk_payload",
            });
        }
        let (payload, after_payload) = after_len.split_at(chunk_len);
        rest = after_payload;

        let remaining_uncompressed = expected_size.saturating_sub(output.len());
        let raw_threshold = remaining_uncompressed.min(CHUNK_MAX);

        if chunk_len == raw_threshold {
            log::trace!("chunk {chunk_index}/{chunk_count}: raw passthrough, {chunk_len} bytes");
            output.extend_from_slice(payload);
        } else {
            log::trace!("chunk {chunk_index}/{chunk_count}: compressed, {chunk_len} bytes in");
            let decompressed = decompress_chunk(format, payload, config)?;
            output.extend_from_slice(&decompressed);
        }
    }

    if output.len() != expected_size {
        return Err(BroodrepError::CorruptSection {
            stage: "section",
            detail: format!(
                "expected {expected_size} decompressed bytes, got {}",
                output.len()
            ),
        });
    }

    Ok((output, rest))
}
