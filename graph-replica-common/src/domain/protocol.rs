// This file is part of graph-replica.
// Copyright (C) 2026 Graph Replica Contributors
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Protocol-level constants and pure codecs (spec.md §6): the positional base64 alphabet used to
//! pack block numbers into account fields, the base58-like alphabet used for folder indices, file
//! flag bits, contract status codes and the token/quote/dex-prefix mapping.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Positional base64 alphabet (not RFC 4648 byte encoding): each character is one base-64 digit
/// of a big-endian integer, as used to pack the "last update block" half of fields like
/// `balances`, `broca`, `bpow`.
const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("character {0:?} is not in the base64 alphabet")]
    InvalidBase64Char(char),

    #[error("base64-encoded block number overflows u64")]
    Overflow,

    #[error("{0} is not a valid contract status code")]
    InvalidContractStatus(u8),
}

/// Decodes a positional-base64-encoded block number, e.g. the `5qUoh` half of
/// `"80975487,5qUoh"`.
pub fn decode_block_number(encoded: &str) -> Result<u64, ProtocolError> {
    let mut n: u64 = 0;

    for c in encoded.chars() {
        let digit = BASE64_ALPHABET
            .iter()
            .position(|&b| b as char == c)
            .ok_or(ProtocolError::InvalidBase64Char(c))? as u64;

        n = n
            .checked_mul(64)
            .and_then(|n| n.checked_add(digit))
            .ok_or(ProtocolError::Overflow)?;
    }

    Ok(n)
}

/// Decodes a single positional-base64 digit, e.g. the one-character `flags` byte on a metadata
/// header.
pub fn decode_base64_digit(c: char) -> Result<u8, ProtocolError> {
    BASE64_ALPHABET
        .iter()
        .position(|&b| b as char == c)
        .map(|pos| pos as u8)
        .ok_or(ProtocolError::InvalidBase64Char(c))
}

/// Encodes a block number using the positional base64 alphabet. `decode_block_number(&encode_block_number(n)) == Ok(n)`
/// for every `n`.
pub fn encode_block_number(mut n: u64) -> String {
    if n == 0 {
        return (BASE64_ALPHABET[0] as char).to_string();
    }

    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE64_ALPHABET[(n % 64) as usize]);
        n /= 64;
    }
    digits.reverse();

    // SAFETY: every pushed byte came from the ASCII BASE64_ALPHABET table.
    String::from_utf8(digits).expect("alphabet is ASCII")
}

/// Base58-like alphabet for folder indices beyond the reserved/preset range (`O`, `I`, `l`, `0`
/// omitted to avoid visual ambiguity).
pub const FOLDER_INDEX_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Preset folder names and their fixed, single-character index in declared order (`2`..`9`).
pub const PRESET_FOLDERS: [(&str, char); 8] = [
    ("Documents", '2'),
    ("Images", '3'),
    ("Videos", '4'),
    ("Music", '5'),
    ("Archives", '6'),
    ("Code", '7'),
    ("Trash", '8'),
    ("Misc", '9'),
];

pub const ROOT_FOLDER_INDEX: char = '0';
pub const FIRST_USER_FOLDER_INDEX: char = '1';

/// Returns the index character for the `slot`-th user-declared (non-preset) folder: the first
/// gets [FIRST_USER_FOLDER_INDEX], subsequent ones walk [FOLDER_INDEX_ALPHABET] in order.
pub fn user_folder_index(slot: usize) -> Option<char> {
    if slot == 0 {
        Some(FIRST_USER_FOLDER_INDEX)
    } else {
        FOLDER_INDEX_ALPHABET.get(slot - 1).copied()
    }
}

/// Looks up the fixed index for a preset folder name, if any.
pub fn preset_folder_index(name: &str) -> Option<char> {
    PRESET_FOLDERS
        .iter()
        .find(|&&(preset_name, _)| preset_name == name)
        .map(|&(_, index)| index)
}

/// Looks up the preset folder name for a fixed index character, if any.
pub fn preset_folder_name(index: char) -> Option<&'static str> {
    PRESET_FOLDERS
        .iter()
        .find(|&&(_, preset_index)| preset_index == index)
        .map(|&(name, _)| name)
}

/// File flag bits (spec.md §6): bit 0 is encrypted, bit 1 is hidden/thumbnail.
pub const FILE_FLAG_ENCRYPTED: u8 = 0b0000_0001;
pub const FILE_FLAG_HIDDEN: u8 = 0b0000_0010;

pub fn file_is_encrypted(flags: u8) -> bool {
    flags & FILE_FLAG_ENCRYPTED != 0
}

pub fn file_is_hidden(flags: u8) -> bool {
    flags & FILE_FLAG_HIDDEN != 0
}

/// StorageContract lifecycle status codes (spec.md §3).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContractStatus {
    Pending = 0,
    Uploading = 1,
    Processing = 2,
    Active = 3,
    Expired = 4,
    Cancelled = 5,
}

impl ContractStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ContractStatus::Expired | ContractStatus::Cancelled)
    }
}

impl TryFrom<u8> for ContractStatus {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ContractStatus::Pending),
            1 => Ok(ContractStatus::Uploading),
            2 => Ok(ContractStatus::Processing),
            3 => Ok(ContractStatus::Active),
            4 => Ok(ContractStatus::Expired),
            5 => Ok(ContractStatus::Cancelled),
            other => Err(ProtocolError::InvalidContractStatus(other)),
        }
    }
}

/// The three tokens whose markets this system indexes (spec.md §3, §4.7).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    Larynx,
    Spk,
    Broca,
}

impl Token {
    /// The feed-path prefix this token's DEX operations are nested under.
    pub fn dex_prefix(self) -> &'static str {
        match self {
            Token::Larynx => "dex",
            Token::Spk => "dexs",
            Token::Broca => "dexb",
        }
    }

    pub fn from_dex_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "dex" => Some(Token::Larynx),
            "dexs" => Some(Token::Spk),
            "dexb" => Some(Token::Broca),
            _ => None,
        }
    }
}

/// Quote currencies DEX markets are denominated in.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quote {
    Hbd,
    Hive,
}

impl Quote {
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "hbd" => Some(Quote::Hbd),
            "hive" => Some(Quote::Hive),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_number_round_trips() {
        for n in [0u64, 1, 63, 64, 65, 4095, 80_975_487, u32::MAX as u64, u64::MAX] {
            let encoded = encode_block_number(n);
            assert_eq!(decode_block_number(&encoded), Ok(n), "n={n} encoded={encoded}");
        }
    }

    #[test]
    fn decode_rejects_unknown_characters() {
        assert_eq!(
            decode_block_number("!!!"),
            Err(ProtocolError::InvalidBase64Char('!'))
        );
    }

    #[test]
    fn user_folder_slots_follow_schedule() {
        assert_eq!(user_folder_index(0), Some('1'));
        assert_eq!(user_folder_index(1), Some('A'));
        assert_eq!(user_folder_index(2), Some('B'));
        // 'I' is skipped in the alphabet.
        assert!(!FOLDER_INDEX_ALPHABET.contains(&'O'));
        assert!(!FOLDER_INDEX_ALPHABET.contains(&'I'));
        assert!(!FOLDER_INDEX_ALPHABET.contains(&'l'));
    }

    #[test]
    fn preset_folder_lookup_is_bidirectional() {
        assert_eq!(preset_folder_index("Documents"), Some('2'));
        assert_eq!(preset_folder_name('9'), Some("Misc"));
        assert_eq!(preset_folder_index("NotAPreset"), None);
    }

    #[test]
    fn file_flags_are_independent_bits() {
        assert!(file_is_encrypted(0b01));
        assert!(!file_is_hidden(0b01));
        assert!(file_is_hidden(0b10));
        assert!(file_is_encrypted(0b11) && file_is_hidden(0b11));
    }

    #[test]
    fn dex_prefix_round_trips() {
        for token in [Token::Larynx, Token::Spk, Token::Broca] {
            let prefix = token.dex_prefix();
            assert_eq!(Token::from_dex_prefix(prefix), Some(token));
        }
    }
}
