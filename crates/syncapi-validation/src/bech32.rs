//! Minimal bech32 (BIP-173) codec
//!
//! Only the original bech32 checksum constant is supported; ledger stake
//! addresses never use bech32m. The length limit is relaxed to 1000
//! characters as addresses exceed the BIP-173 limit of 90.

use crate::error::Bech32Error;

/// Longest accepted input
pub const MAX_LENGTH: usize = 1000;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const GENERATOR: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];
const CHECKSUM_LEN: usize = 6;

fn polymod(values: impl IntoIterator<Item = u8>) -> u32 {
    let mut chk: u32 = 1;
    for value in values {
        let top = chk >> 25;
        chk = ((chk & 0x01ff_ffff) << 5) ^ u32::from(value);
        for (i, generator) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= generator;
            }
        }
    }
    chk
}

fn hrp_expand(hrp: &str) -> Vec<u8> {
    let bytes = hrp.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() * 2 + 1);
    out.extend(bytes.iter().map(|b| b >> 5));
    out.push(0);
    out.extend(bytes.iter().map(|b| b & 0x1f));
    out
}

fn charset_index(c: u8) -> Option<u8> {
    CHARSET.iter().position(|&x| x == c).map(|i| i as u8)
}

/// Regroup a sequence of `from`-bit words into `to`-bit words
fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>, Bech32Error> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max = (1u32 << to) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for &value in data {
        acc = (acc << from) | u32::from(value);
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max) != 0 {
        return Err(Bech32Error::InvalidPadding);
    }

    Ok(out)
}

/// Decode a bech32 string into its lowercase prefix and 8-bit payload
pub fn decode(input: &str) -> Result<(String, Vec<u8>), Bech32Error> {
    if input.len() > MAX_LENGTH {
        return Err(Bech32Error::TooLong(input.len()));
    }

    let has_lower = input.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = input.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(Bech32Error::MixedCase);
    }
    let input = input.to_ascii_lowercase();

    let separator = input.rfind('1').ok_or(Bech32Error::MissingSeparator)?;
    if separator == 0 || separator + CHECKSUM_LEN + 1 > input.len() {
        return Err(Bech32Error::MissingSeparator);
    }

    let (hrp, rest) = input.split_at(separator);
    if let Some(c) = hrp.chars().find(|c| !(33..=126).contains(&(*c as u32))) {
        return Err(Bech32Error::InvalidPrefixChar(c));
    }

    let mut words = Vec::with_capacity(rest.len() - 1);
    for c in rest[1..].bytes() {
        let word = charset_index(c).ok_or(Bech32Error::InvalidDataChar(c as char))?;
        words.push(word);
    }

    let mut values = hrp_expand(hrp);
    values.extend_from_slice(&words);
    if polymod(values) != 1 {
        return Err(Bech32Error::InvalidChecksum);
    }

    words.truncate(words.len() - CHECKSUM_LEN);
    let payload = convert_bits(&words, 5, 8, false)?;
    Ok((hrp.to_string(), payload))
}

/// Encode `payload` under prefix `hrp`
pub fn encode(hrp: &str, payload: &[u8]) -> String {
    // 8 -> 5 with padding cannot fail
    let words = convert_bits(payload, 8, 5, true).unwrap_or_default();

    let mut values = hrp_expand(hrp);
    values.extend_from_slice(&words);
    values.extend_from_slice(&[0u8; CHECKSUM_LEN]);
    let pm = polymod(values) ^ 1;

    let mut out = String::with_capacity(hrp.len() + 1 + words.len() + CHECKSUM_LEN);
    out.push_str(hrp);
    out.push('1');
    for word in words {
        out.push(CHARSET[word as usize] as char);
    }
    for i in 0..CHECKSUM_LEN {
        let word = (pm >> (5 * (5 - i))) & 0x1f;
        out.push(CHARSET[word as usize] as char);
    }
    out
}
