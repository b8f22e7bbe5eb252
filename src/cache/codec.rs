use std::io::Read;
use crate::core::config::CompressionType;
use crate::core::error::{Error, ErrorKind, Result};

const HEADER_LEN: usize = 5;

/// Best case LZ4 block expansion; a header claiming more is forged.
const LZ4_MAX_RATIO: usize = 255;

/// Compressed payload as stored by the persistent cache tier.
///
/// On disk: one tag byte naming the compression, the original length as a
/// little-endian u32, then the compressed bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedBlock {
    pub data: Vec<u8>,
    pub original_size: usize,
    pub compression: CompressionType,
}

impl CompressedBlock {
    pub fn compress(data: &[u8], compression: CompressionType) -> Result<Self> {
        let compressed = match compression {
            CompressionType::None => data.to_vec(),
            CompressionType::Lz4 => lz4_flex::block::compress(data),
            CompressionType::Zstd => zstd::encode_all(data, 3)?,  // Level 3 is balanced
        };

        Ok(CompressedBlock {
            data: compressed,
            original_size: data.len(),
            compression,
        })
    }

    /// Restore the payload, refusing anything whose declared or actual
    /// size exceeds `limit` bytes before allocating for it.
    pub fn decompress(&self, limit: usize) -> Result<Vec<u8>> {
        if self.original_size > limit {
            return Err(Error::new(
                ErrorKind::Cache,
                format!("frame declares {} bytes, limit is {}", self.original_size, limit),
            ));
        }

        let data = match self.compression {
            CompressionType::None => self.data.clone(),
            CompressionType::Lz4 => {
                if self.original_size > self.data.len().saturating_mul(LZ4_MAX_RATIO) {
                    return Err(Error::new(
                        ErrorKind::Cache,
                        format!("lz4 frame of {} bytes cannot expand to {}", self.data.len(), self.original_size),
                    ));
                }
                lz4_flex::block::decompress(&self.data, self.original_size)
                    .map_err(|e| Error::new(ErrorKind::Cache, format!("lz4: {}", e)))?
            }
            CompressionType::Zstd => {
                let decoder = zstd::stream::read::Decoder::new(&self.data[..])
                    .map_err(|e| Error::new(ErrorKind::Cache, format!("zstd: {}", e)))?;
                let mut data = Vec::new();
                decoder.take(self.original_size as u64 + 1)
                    .read_to_end(&mut data)
                    .map_err(|e| Error::new(ErrorKind::Cache, format!("zstd: {}", e)))?;
                data
            }
        };

        if data.len() != self.original_size {
            return Err(Error::new(
                ErrorKind::Cache,
                format!("decompressed {} bytes, expected {}", data.len(), self.original_size),
            ));
        }
        Ok(data)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let original = u32::try_from(self.original_size)
            .map_err(|_| Error::new(ErrorKind::Cache, "payload too large for cache frame"))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len());
        bytes.push(tag(self.compression));
        bytes.extend_from_slice(&original.to_le_bytes());
        bytes.extend_from_slice(&self.data);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::new(ErrorKind::Cache, "truncated cache frame"));
        }

        let compression = match bytes[0] {
            0 => CompressionType::None,
            1 => CompressionType::Lz4,
            2 => CompressionType::Zstd,
            other => return Err(Error::new(ErrorKind::Cache, format!("unknown compression tag {}", other))),
        };
        let original_size = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;

        Ok(CompressedBlock {
            data: bytes[HEADER_LEN..].to_vec(),
            original_size,
            compression,
        })
    }
}

/// Compress and frame a payload in one step.
pub fn encode(data: &[u8], compression: CompressionType) -> Result<Vec<u8>> {
    CompressedBlock::compress(data, compression)?.to_bytes()
}

/// Unframe and decompress, with `limit` bounding the restored size.
pub fn decode(bytes: &[u8], limit: usize) -> Result<Vec<u8>> {
    CompressedBlock::from_bytes(bytes)?.decompress(limit)
}

fn tag(compression: CompressionType) -> u8 {
    match compression {
        CompressionType::None => 0,
        CompressionType::Lz4 => 1,
        CompressionType::Zstd => 2,
    }
}
