//! Sealed kernel artifact format.
//!
//! Layout on disk:
//! [ magic: u32 ][ format: u16 ][ reserved: u16 ][ generator_revision: u32 ]
//! [ body_len: u64 ][ checksum: 32 bytes ]
//! [ body bytes … ]
//!
//! The checksum is blake3 over (header || body). The body is the compiled
//! kernel template. A generator revision other than the running one is a
//! load failure, so artifacts left behind by an older build get rebuilt
//! instead of being trusted.

use colsort_codegen::{KernelTemplate, GENERATOR_REVISION};
use colsort_core::hash::hash_parts;
use thiserror::Error;

pub const MAGIC: u32 = 0x4B4E_5343; // "CSNK" (colsort kernel)
pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 4 + 2 + 2 + 4 + 8;
pub const CHECKSUM_LEN: usize = 32;
pub const PREAMBLE_LEN: usize = HEADER_LEN + CHECKSUM_LEN;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("artifact truncated: {0} bytes")]
    Truncated(usize),
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported artifact format {0}")]
    Format(u16),
    #[error("artifact built by generator revision {found}, expected {expected}")]
    Revision { found: u32, expected: u32 },
    #[error("body length {declared} does not match {actual} stored bytes")]
    Length { declared: u64, actual: usize },
    #[error("checksum mismatch")]
    Checksum,
    #[error("malformed kernel body: {0}")]
    Body(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactHeader {
    pub magic: u32,
    pub format: u16,
    pub revision: u32,
    pub body_len: u64,
}

impl ArtifactHeader {
    pub fn new(body_len: u64) -> Self {
        Self {
            magic: MAGIC,
            format: FORMAT_VERSION,
            revision: GENERATOR_REVISION,
            body_len,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..6].copy_from_slice(&self.format.to_le_bytes());
        // bytes[6..8] reserved
        out[8..12].copy_from_slice(&self.revision.to_le_bytes());
        out[12..20].copy_from_slice(&self.body_len.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        if bytes.len() < HEADER_LEN {
            return Err(ArtifactError::Truncated(bytes.len()));
        }
        let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let magic = u32_at(0);
        let format = u16::from_le_bytes([bytes[4], bytes[5]]);
        let revision = u32_at(8);
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[12..20]);
        let body_len = u64::from_le_bytes(len);

        if magic != MAGIC {
            return Err(ArtifactError::BadMagic(magic));
        }
        if format != FORMAT_VERSION {
            return Err(ArtifactError::Format(format));
        }
        Ok(Self {
            magic,
            format,
            revision,
            body_len,
        })
    }
}

/// Seal a validated template into artifact bytes.
pub fn encode(template: &KernelTemplate) -> Result<Vec<u8>, ArtifactError> {
    let body = serde_json::to_vec(template).map_err(|e| ArtifactError::Body(e.to_string()))?;
    let header = ArtifactHeader::new(body.len() as u64).to_bytes();
    let checksum = hash_parts(&[&header, &body]);

    let mut out = Vec::with_capacity(PREAMBLE_LEN + body.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(checksum.as_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Verify and open artifact bytes.
pub fn decode(bytes: &[u8]) -> Result<KernelTemplate, ArtifactError> {
    if bytes.len() < PREAMBLE_LEN {
        return Err(ArtifactError::Truncated(bytes.len()));
    }
    let header = ArtifactHeader::from_bytes(&bytes[..HEADER_LEN])?;
    let body = &bytes[PREAMBLE_LEN..];
    if header.body_len != body.len() as u64 {
        return Err(ArtifactError::Length {
            declared: header.body_len,
            actual: body.len(),
        });
    }
    let computed = hash_parts(&[&bytes[..HEADER_LEN], body]);
    if computed.as_bytes()[..] != bytes[HEADER_LEN..PREAMBLE_LEN] {
        return Err(ArtifactError::Checksum);
    }
    if header.revision != GENERATOR_REVISION {
        return Err(ArtifactError::Revision {
            found: header.revision,
            expected: GENERATOR_REVISION,
        });
    }
    let template: KernelTemplate =
        serde_json::from_slice(body).map_err(|e| ArtifactError::Body(e.to_string()))?;
    template
        .validate()
        .map_err(|e| ArtifactError::Body(e.to_string()))?;
    Ok(template)
}
