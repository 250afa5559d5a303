//! Encryption and key-rotation modes.

use crate::LayoutError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cipher mode of an encryption context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    /// No encryption configured.
    #[default]
    None,
    /// AES-256-CBC with a tablespace key wrapped by a master key.
    Aes,
    /// AES-256-CBC with versioned keys fetched directly from the keyring.
    Keyring,
}

impl EncryptionMode {
    /// Returns the name used in table options and status output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "N",
            Self::Aes => "Y",
            Self::Keyring => "KEYRING",
        }
    }

    /// True when the mode ciphers data.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionMode {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "N" | "NONE" => Ok(Self::None),
            "Y" | "AES" => Ok(Self::Aes),
            "KEYRING" => Ok(Self::Keyring),
            _ => Err(LayoutError::UnknownMode(s.to_string())),
        }
    }
}

/// Key rotation in progress for a tablespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    #[default]
    None,
    /// Pages are being re-encrypted from master-key mode to keyring mode.
    /// Encrypted pages additionally carry a post-encryption checksum.
    MasterKeyToKeyring,
}
