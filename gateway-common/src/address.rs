//! Conversions between TON's "raw" address form (`workchain:hex`) and its
//! base64 "friendly" forms (bounceable / non-bounceable, standard / url-safe).
//!
//! Ported from the original gateway's address helper module: a friendly
//! address is `tag || workchain || address || crc16` base64-encoded, where
//! `tag` distinguishes bounceable (`0x11`) from non-bounceable (`0x51`) and
//! carries a test-only bit (`0x80`).

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;

const BOUNCEABLE_TAG: u8 = 0x11;
const NON_BOUNCEABLE_TAG: u8 = 0x51;
const TEST_ONLY_BIT: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAddress {
    pub workchain: i32,
    pub address: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendlyAddress {
    pub raw: RawAddress,
    pub bounceable: bool,
    pub test_only: bool,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("not a valid address")]
    NotAnAddress,
    #[error("address checksum mismatch")]
    WrongChecksum,
    #[error("unknown address tag")]
    UnknownTag,
    #[error("invalid raw address form")]
    InvalidRawForm,
}

/// CRC-16/XMODEM over `message`, matching the original implementation's
/// bit-by-bit CCITT-poly accumulator.
fn crc16(message: &[u8]) -> u16 {
    let poly: u32 = 0x1021;
    let mut reg: u32 = 0;
    let padded = message.iter().copied().chain([0u8, 0u8]);
    for byte in padded {
        let mut mask: u8 = 0x80;
        while mask > 0 {
            reg <<= 1;
            if byte & mask != 0 {
                reg += 1;
            }
            if reg > 0xffff {
                reg &= 0xffff;
                reg ^= poly;
            }
            mask >>= 1;
        }
    }
    reg as u16
}

impl RawAddress {
    pub fn parse(raw_form: &str) -> Result<Self, AddressError> {
        let (workchain, hex_address) = raw_form
            .split_once(':')
            .ok_or(AddressError::InvalidRawForm)?;
        let workchain: i32 = workchain.parse().map_err(|_| AddressError::InvalidRawForm)?;
        if hex_address.len() != 64 {
            return Err(AddressError::InvalidRawForm);
        }
        let mut address = [0u8; 32];
        for i in 0..32 {
            address[i] = u8::from_str_radix(&hex_address[i * 2..i * 2 + 2], 16)
                .map_err(|_| AddressError::InvalidRawForm)?;
        }
        Ok(RawAddress { workchain, address })
    }

    pub fn to_raw_form(self) -> String {
        let mut hex = String::with_capacity(64);
        for byte in self.address {
            hex.push_str(&format!("{byte:02x}"));
        }
        format!("{}:{}", self.workchain, hex)
    }

    fn workchain_tag(&self) -> u8 {
        if self.workchain == -1 {
            0xff
        } else {
            self.workchain as u8
        }
    }

    fn encode(&self, tag: u8, test_only: bool) -> (String, String) {
        let tag = if test_only { tag | TEST_ONLY_BIT } else { tag };
        let mut payload = Vec::with_capacity(36);
        payload.push(tag);
        payload.push(self.workchain_tag());
        payload.extend_from_slice(&self.address);
        let crc = crc16(&payload);
        payload.push((crc >> 8) as u8);
        payload.push((crc & 0xff) as u8);
        (STANDARD.encode(&payload), URL_SAFE.encode(&payload))
    }

    pub fn to_friendly(&self, bounceable: bool, test_only: bool) -> (String, String) {
        let tag = if bounceable {
            BOUNCEABLE_TAG
        } else {
            NON_BOUNCEABLE_TAG
        };
        self.encode(tag, test_only)
    }
}

/// Parses either base64 or base64url friendly form and validates its
/// checksum, returning the decoded raw address plus its flags.
pub fn read_friendly_address(address: &str) -> Result<FriendlyAddress, AddressError> {
    let is_standard = address.bytes().all(|b| {
        b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='
    });
    let is_urlsafe = address.bytes().all(|b| {
        b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'='
    });
    let bytes = if is_standard {
        STANDARD.decode(address)
    } else if is_urlsafe {
        URL_SAFE.decode(address)
    } else {
        return Err(AddressError::NotAnAddress);
    }
    .map_err(|_| AddressError::NotAnAddress)?;

    if bytes.len() != 36 {
        return Err(AddressError::NotAnAddress);
    }
    let (body, checksum) = bytes.split_at(34);
    if crc16(body).to_be_bytes() != checksum {
        return Err(AddressError::WrongChecksum);
    }

    let mut tag = body[0];
    let test_only = tag & TEST_ONLY_BIT != 0;
    if test_only {
        tag ^= TEST_ONLY_BIT;
    }
    let bounceable = if tag == BOUNCEABLE_TAG {
        true
    } else if tag == NON_BOUNCEABLE_TAG {
        false
    } else {
        return Err(AddressError::UnknownTag);
    };

    let workchain = if body[1] == 0xff { -1 } else { body[1] as i32 };
    let mut address_bytes = [0u8; 32];
    address_bytes.copy_from_slice(&body[2..34]);

    Ok(FriendlyAddress {
        raw: RawAddress {
            workchain,
            address: address_bytes,
        },
        bounceable,
        test_only,
    })
}

/// Round-trips a friendly address through its bounceable base64 form,
/// matching the `pack(unpack(addr)) == addr` property.
pub fn normalize_to_bounceable(address: &str) -> Result<String, AddressError> {
    let friendly = read_friendly_address(address)?;
    let (b64, _) = friendly.raw.to_friendly(true, friendly.test_only);
    Ok(b64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_form_round_trips() {
        let raw = RawAddress::parse(
            "-1:3333333333333333333333333333333333333333333333333333333333333333",
        )
        .unwrap();
        assert_eq!(
            raw.to_raw_form(),
            "-1:3333333333333333333333333333333333333333333333333333333333333333"
        );
    }

    #[test]
    fn friendly_address_round_trips() {
        let raw = RawAddress::parse(
            "0:0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        let (bounceable, _) = raw.to_friendly(true, false);
        let decoded = read_friendly_address(&bounceable).unwrap();
        assert_eq!(decoded.raw, raw);
        assert!(decoded.bounceable);
        assert!(!decoded.test_only);

        let repacked = normalize_to_bounceable(&bounceable).unwrap();
        assert_eq!(repacked, bounceable);
    }

    #[test]
    fn rejects_bad_checksum() {
        let raw = RawAddress::parse(
            "0:0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        let (bounceable, _) = raw.to_friendly(true, false);
        let mut corrupted = bounceable.into_bytes();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == b'A' { b'B' } else { b'A' };
        let corrupted = String::from_utf8(corrupted).unwrap();
        assert_eq!(
            read_friendly_address(&corrupted),
            Err(AddressError::WrongChecksum)
        );
    }
}
