use crate::errors::CoreError;

use super::encryption::{KdfParams, Sealed, NONCE_LEN, SALT_LEN};

/// Magic bytes identifying a finance-tracker ledger file.
pub const MAGIC: &[u8; 4] = b"FTLG";

pub const CURRENT_VERSION: u16 = 1;

/// magic(4) + version(2) + kdf(12) + salt(16) + nonce(12) + payload_len(8)
pub const HEADER_LEN: usize = 4 + 2 + 12 + SALT_LEN + NONCE_LEN + 8;

/// Everything a ledger file carries besides the magic bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerFile {
    pub version: u16,
    pub kdf_params: KdfParams,
    pub sealed: Sealed,
}

impl LedgerFile {
    pub fn new(kdf_params: KdfParams, sealed: Sealed) -> Self {
        Self {
            version: CURRENT_VERSION,
            kdf_params,
            sealed,
        }
    }

    /// Layout (all integers little-endian):
    /// ```text
    /// [FTLG] [version u16] [memory u32] [time u32] [parallelism u32]
    /// [salt 16B] [nonce 12B] [payload_len u64] [payload]
    /// ```
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.sealed.ciphertext.len());
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.kdf_params.memory_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf_params.time_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf_params.parallelism.to_le_bytes());
        buf.extend_from_slice(&self.sealed.salt);
        buf.extend_from_slice(&self.sealed.nonce);
        buf.extend_from_slice(&(self.sealed.ciphertext.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.sealed.ciphertext);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, CoreError> {
        if data.len() < HEADER_LEN {
            return Err(CoreError::InvalidFileFormat(
                "File too small to be a ledger file".into(),
            ));
        }
        let mut reader = ByteReader { data, offset: 0 };

        if reader.take::<4>()? != *MAGIC {
            return Err(CoreError::InvalidFileFormat(
                "Invalid magic bytes: not a ledger file".into(),
            ));
        }

        let version = u16::from_le_bytes(reader.take()?);
        if version == 0 || version > CURRENT_VERSION {
            return Err(CoreError::UnsupportedVersion(version));
        }

        let kdf_params = KdfParams {
            memory_cost: u32::from_le_bytes(reader.take()?),
            time_cost: u32::from_le_bytes(reader.take()?),
            parallelism: u32::from_le_bytes(reader.take()?),
        };
        kdf_params.check_bounds()?;

        let salt = reader.take::<SALT_LEN>()?;
        let nonce = reader.take::<NONCE_LEN>()?;
        let payload_len = u64::from_le_bytes(reader.take()?);

        let remaining = reader.remaining();
        if (remaining.len() as u64) < payload_len {
            return Err(CoreError::InvalidFileFormat(format!(
                "File truncated: expected {payload_len} payload bytes, got {}",
                remaining.len()
            )));
        }

        Ok(Self {
            version,
            kdf_params,
            sealed: Sealed {
                salt,
                nonce,
                ciphertext: remaining[..payload_len as usize].to_vec(),
            },
        })
    }
}

struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], CoreError> {
        let end = self.offset + N;
        let slice = self.data.get(self.offset..end).ok_or_else(|| {
            CoreError::InvalidFileFormat(format!("Unexpected end of header at byte {}", self.offset))
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.offset = end;
        Ok(out)
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }
}
