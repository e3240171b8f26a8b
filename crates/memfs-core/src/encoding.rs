// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Text encodings accepted by the read/write family

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{CodeResult, ErrorCode};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    #[serde(alias = "binary")]
    Latin1,
    Hex,
    Base64,
}

impl Encoding {
    /// Text to stored bytes
    pub fn encode(&self, text: &str) -> CodeResult<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            // Only the low byte of each code point survives, as with `Buffer.from(s, 'latin1')`
            Encoding::Latin1 => Ok(text.chars().map(|c| c as u32 as u8).collect()),
            Encoding::Hex => hex::decode(text).map_err(|_| ErrorCode::InvalidArgument),
            Encoding::Base64 => STANDARD
                .decode(text)
                .map_err(|_| ErrorCode::InvalidArgument),
        }
    }

    /// Stored bytes to text
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Encoding::Hex => hex::encode(bytes),
            Encoding::Base64 => STANDARD.encode(bytes),
        }
    }
}
