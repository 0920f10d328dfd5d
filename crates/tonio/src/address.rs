use std::{fmt, str::FromStr};

use base64::{
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    Engine as _,
};

use crate::errors::TonError;

const FRIENDLY_LEN: usize = 36;
const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const FLAG_TESTNET: u8 = 0x80;

/// A TON account address parsed from its user-facing ("friendly") form:
/// 36 base64 bytes of tag, workchain, 32-byte state-init hash and a
/// CRC-16/XMODEM checksum over the first 34 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TonAddress {
    workchain: i8,
    hash: [u8; 32],
    friendly: String,
}

impl TonAddress {
    /// Builds the bounceable friendly form for a raw `(workchain, hash)`
    /// pair.
    pub fn new(workchain: i8, hash: [u8; 32]) -> Self {
        let mut raw = Vec::with_capacity(FRIENDLY_LEN);
        raw.push(TAG_BOUNCEABLE);
        raw.push(workchain as u8);
        raw.extend_from_slice(&hash);
        let crc = crc16_xmodem(&raw);
        raw.extend_from_slice(&crc.to_be_bytes());

        Self {
            workchain,
            hash,
            friendly: URL_SAFE_NO_PAD.encode(raw),
        }
    }

    pub fn workchain(&self) -> i8 {
        self.workchain
    }

    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }
}

impl FromStr for TonAddress {
    type Err = TonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Friendly addresses circulate in both base64 alphabets.
        let raw = URL_SAFE_NO_PAD
            .decode(s)
            .or_else(|_| STANDARD_NO_PAD.decode(s))
            .map_err(|_| TonError::InvalidAddress(s.to_string()))?;

        if raw.len() != FRIENDLY_LEN {
            return Err(TonError::InvalidAddress(s.to_string()));
        }

        let tag = raw[0] & !FLAG_TESTNET;
        if tag != TAG_BOUNCEABLE && tag != TAG_NON_BOUNCEABLE {
            return Err(TonError::InvalidAddress(s.to_string()));
        }

        let checksum = u16::from_be_bytes([raw[34], raw[35]]);
        if crc16_xmodem(&raw[..34]) != checksum {
            return Err(TonError::InvalidAddress(s.to_string()));
        }

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&raw[2..34]);

        Ok(Self {
            workchain: raw[1] as i8,
            hash,
            friendly: s.to_string(),
        })
    }
}

impl fmt::Display for TonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.friendly)
    }
}

fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
