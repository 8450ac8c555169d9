//! Stake (reward) address parsing

use std::fmt;
use std::str::FromStr;

use crate::bech32;
use crate::error::{ValidationError, ValidationResult};

/// Mainnet stake address prefix
pub const MAINNET_PREFIX: &str = "stake";
/// Testnet stake address prefix
pub const TESTNET_PREFIX: &str = "stake_test";

const PAYLOAD_LEN: usize = 29;
const KEY_HASH_HEADER: u8 = 0b1110;
const SCRIPT_HASH_HEADER: u8 = 0b1111;

/// Kind of credential a reward address is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StakeCredential {
    /// Verification key hash
    KeyHash,
    /// Script hash
    ScriptHash,
}

/// A decoded stake address
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StakeAddress {
    network_id: u8,
    credential: StakeCredential,
    hash: [u8; 28],
}

impl StakeAddress {
    /// Parse a bech32 stake address
    pub fn parse(input: &str) -> ValidationResult<Self> {
        if input.is_empty() {
            return Err(ValidationError::Empty);
        }

        let (prefix, payload) = bech32::decode(input)?;
        let expected_network = match prefix.as_str() {
            MAINNET_PREFIX => 1,
            TESTNET_PREFIX => 0,
            _ => return Err(ValidationError::UnexpectedPrefix(prefix)),
        };

        if payload.len() != PAYLOAD_LEN {
            return Err(ValidationError::InvalidLength(payload.len()));
        }

        let header = payload[0];
        let credential = match header >> 4 {
            KEY_HASH_HEADER => StakeCredential::KeyHash,
            SCRIPT_HASH_HEADER => StakeCredential::ScriptHash,
            _ => return Err(ValidationError::NotRewardAddress(header)),
        };

        let network_id = header & 0x0f;
        if network_id != expected_network {
            return Err(ValidationError::NetworkMismatch { prefix, network_id });
        }

        let mut hash = [0u8; 28];
        hash.copy_from_slice(&payload[1..]);
        Ok(Self {
            network_id,
            credential,
            hash,
        })
    }

    /// Network id from the header byte (1 = mainnet)
    pub fn network_id(&self) -> u8 {
        self.network_id
    }

    /// Whether this address belongs to mainnet
    pub fn is_mainnet(&self) -> bool {
        self.network_id == 1
    }

    /// Credential kind
    pub fn credential(&self) -> StakeCredential {
        self.credential
    }

    /// 28-byte credential hash
    pub fn hash(&self) -> &[u8; 28] {
        &self.hash
    }

    fn header(&self) -> u8 {
        let kind = match self.credential {
            StakeCredential::KeyHash => KEY_HASH_HEADER,
            StakeCredential::ScriptHash => SCRIPT_HASH_HEADER,
        };
        (kind << 4) | self.network_id
    }

    /// Canonical (lowercase) bech32 form
    pub fn to_bech32(&self) -> String {
        let prefix = if self.is_mainnet() {
            MAINNET_PREFIX
        } else {
            TESTNET_PREFIX
        };
        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        payload.push(self.header());
        payload.extend_from_slice(&self.hash);
        bech32::encode(prefix, &payload)
    }
}

impl FromStr for StakeAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StakeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bech32())
    }
}

impl fmt::Debug for StakeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StakeAddress({})", self.to_bech32())
    }
}
