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

//! Metadata Parser (C6, spec §4.4): decodes the pipe/comma/base64/bitflag-encoded contract
//! metadata string into folders and per-file metadata.
//!
//! Three grammars are tried in priority order, each a recognizer that returns `Some` only when
//! its shape matches (spec §9): encryption-short-form, standard-with-folders, legacy-bare. The
//! precedence and the directory-itemCount rule both rest on spec.md's open questions; the
//! decisions taken are recorded in DESIGN.md.

use graph_replica_common::domain::protocol::{
    self, FIRST_USER_FOLDER_INDEX, FOLDER_INDEX_ALPHABET, ROOT_FOLDER_INDEX, preset_folder_index,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionGrant {
    pub encrypted_key: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub index: char,
    pub name: String,
    /// `None` means the folder's parent is root.
    pub parent_index: Option<char>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFileMeta {
    /// `None` when the group was unparseable; the caller falls back to `name = cid` (spec §4.4
    /// failure mode).
    pub name: Option<String>,
    pub extension: Option<String>,
    pub folder_index: Option<char>,
    pub thumbnail: Option<String>,
    pub flags: u8,
    pub license: Option<String>,
    pub labels: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMetadata {
    pub auto_renew: bool,
    pub encryption_grants: Vec<EncryptionGrant>,
    pub folders: Vec<FolderEntry>,
    /// Parallel to the content-id-sorted data-file map: `files[i]` is file `i`'s metadata.
    pub files: Vec<ParsedFileMeta>,
}

/// Parses `metadata` against `file_count` (the number of entries in the contract's
/// content-id-sorted data-file map). Never fails: malformed input yields as much partial
/// structure as parseable (spec §4.4).
pub fn parse(metadata: &str, file_count: usize) -> ParsedMetadata {
    if let Some(result) = try_encryption_short_form(metadata, file_count) {
        return result;
    }
    if let Some(result) = try_standard_with_folders(metadata, file_count) {
        return result;
    }
    legacy_bare(metadata, file_count)
}

/// `#...@<user>[;#...@<user>...]` with no `|` anywhere: encryption grants only, all files at
/// root.
fn try_encryption_short_form(metadata: &str, file_count: usize) -> Option<ParsedMetadata> {
    if !metadata.starts_with('#') || metadata.contains('|') {
        return None;
    }

    let (header, rest) = metadata.split_once(',').unwrap_or((metadata, ""));
    let grants = parse_encryption_grants(header);
    if grants.is_empty() {
        return None;
    }

    Some(ParsedMetadata {
        auto_renew: false,
        encryption_grants: grants,
        folders: Vec::new(),
        files: parse_file_groups(rest, file_count),
    })
}

/// `<flags>[#<encData>]|<folder1>|<folder2>|...,<file groups...>`.
fn try_standard_with_folders(metadata: &str, file_count: usize) -> Option<ParsedMetadata> {
    let (header_field, rest) = metadata.split_once(',').unwrap_or((metadata, ""));
    if !header_field.contains('|') {
        return None;
    }

    let mut header_parts = header_field.split('|');
    let flags_and_enc = header_parts.next()?;
    let folder_names: Vec<&str> = header_parts.collect();

    let (flags_char, enc_data) = match flags_and_enc.split_once('#') {
        Some((flags, enc)) => (flags.chars().next(), Some(enc)),
        None => (flags_and_enc.chars().next(), None),
    };
    let flags_char = flags_char?;
    let flags = protocol::decode_base64_digit(flags_char).ok()?;
    let auto_renew = flags & 0b1 != 0;
    let encryption_grants = enc_data.map(parse_encryption_grants).unwrap_or_default();

    let folders = assign_folder_indices(&folder_names);

    Some(ParsedMetadata {
        auto_renew,
        encryption_grants,
        folders,
        files: parse_file_groups(rest, file_count),
    })
}

/// Unconditional fallback: no header grammar recognized at all, the whole string is file groups.
fn legacy_bare(metadata: &str, file_count: usize) -> ParsedMetadata {
    ParsedMetadata {
        auto_renew: false,
        encryption_grants: Vec::new(),
        folders: Vec::new(),
        files: parse_file_groups(metadata, file_count),
    }
}

/// `;`-separated `#<encryptedKey>@<username>` grants, optionally prefixed by a flags byte on the
/// first one, which the caller has already stripped.
fn parse_encryption_grants(data: &str) -> Vec<EncryptionGrant> {
    data.split(';')
        .filter_map(|grant| {
            let grant = grant.trim_start_matches('#');
            let (key, user) = grant.split_once('@')?;
            if key.is_empty() || user.is_empty() {
                return None;
            }
            Some(EncryptionGrant {
                encrypted_key: key.to_string(),
                username: user.to_string(),
            })
        })
        .collect()
}

/// Assigns each declared folder name an index per the fixed schedule (spec §6): preset names get
/// their reserved index, everything else walks the user-folder schedule in declaration order.
/// Entries of the form `<parentIndex>/<name>` reference an index already assigned earlier in the
/// same list.
fn assign_folder_indices(folder_names: &[&str]) -> Vec<FolderEntry> {
    let mut entries = Vec::with_capacity(folder_names.len());
    let mut user_slot = 0usize;

    for raw in folder_names {
        let (parent_index, name) = match raw.split_once('/') {
            Some((parent, name)) => (parent.chars().next(), name),
            None => (None, *raw),
        };

        let index = match preset_folder_index(name) {
            Some(preset_index) => preset_index,
            None => {
                let index = user_folder_index(user_slot);
                user_slot += 1;
                index
            }
        };

        entries.push(FolderEntry {
            index,
            name: name.to_string(),
            parent_index,
        });
    }

    entries
}

fn user_folder_index(slot: usize) -> char {
    graph_replica_common::domain::protocol::user_folder_index(slot)
        .unwrap_or(*FOLDER_INDEX_ALPHABET.last().expect("non-empty alphabet"))
}

/// Groups of four comma-delimited fields: `name, ext.folderIndex, thumbCid, flags-license-labels`.
fn parse_file_groups(rest: &str, file_count: usize) -> Vec<ParsedFileMeta> {
    if rest.is_empty() || file_count == 0 {
        return Vec::new();
    }

    let fields: Vec<&str> = rest.split(',').collect();
    let mut files = Vec::with_capacity(file_count);

    for i in 0..file_count {
        let base = i * 4;
        let Some(chunk) = fields.get(base..base + 4) else {
            files.push(ParsedFileMeta::default());
            continue;
        };
        files.push(parse_one_file_group(chunk));
    }

    files
}

fn parse_one_file_group(fields: &[&str]) -> ParsedFileMeta {
    let [name, ext_and_folder, thumb, flags_license_labels] = fields else {
        return ParsedFileMeta::default();
    };

    let (extension, folder_index) = match ext_and_folder.split_once('.') {
        Some((ext, idx)) => (non_empty(ext), idx.chars().next()),
        None => (non_empty(ext_and_folder), Some(FIRST_USER_FOLDER_INDEX)),
    };

    let mut sub = (*flags_license_labels).splitn(3, '-');
    let flags = sub
        .next()
        .and_then(|f| f.parse::<u8>().ok())
        .unwrap_or(0);
    let license = sub.next().and_then(non_empty);
    let labels = sub.next().and_then(non_empty);

    ParsedFileMeta {
        name: non_empty(name),
        extension,
        folder_index,
        thumbnail: non_empty(thumb),
        flags,
        license,
        labels,
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Resolves a file's folder index to its full directory path given the contract's parsed folder
/// list. Absent or root (`0`) resolves to `/`; an index naming no declared folder also falls back
/// to `/` (spec §4.4's "absent or `1` with no user folder declared" rule generalizes to any
/// dangling index).
pub fn folder_full_path(folder_index: Option<char>, folders: &[FolderEntry]) -> String {
    let Some(index) = folder_index else {
        return "/".to_string();
    };
    if index == ROOT_FOLDER_INDEX {
        return "/".to_string();
    }

    let mut segments = Vec::new();
    let mut current = folders.iter().find(|f| f.index == index);
    while let Some(entry) = current {
        segments.push(entry.name.as_str());
        current = entry
            .parent_index
            .filter(|&p| p != ROOT_FOLDER_INDEX)
            .and_then(|p| folders.iter().find(|f| f.index == p));
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    segments.reverse();
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_form_assigns_first_user_folder_index_one() {
        let parsed = parse("1|TestFolder,file1,txt,,0,file2,txt,,0", 2);
        assert!(parsed.auto_renew);
        assert_eq!(parsed.folders, vec![FolderEntry {
            index: '1',
            name: "TestFolder".to_string(),
            parent_index: None,
        }]);
        assert_eq!(parsed.files.len(), 2);
        assert_eq!(parsed.files[0].name.as_deref(), Some("file1"));
        assert_eq!(parsed.files[0].folder_index, Some('1'));
        assert_eq!(folder_full_path(Some('1'), &parsed.folders), "/TestFolder");
    }

    #[test]
    fn hidden_flag_file_has_no_registered_path_relevance() {
        let parsed = parse("1|Pics,photo,jpg.1,QmThumb,0--,thumb,jpg.1,,2--", 2);
        assert_eq!(parsed.files[0].flags, 0);
        assert_eq!(parsed.files[1].flags, 2);
        assert!(protocol::file_is_hidden(parsed.files[1].flags));
        assert!(!protocol::file_is_hidden(parsed.files[0].flags));
    }

    #[test]
    fn encryption_short_form_has_no_folders_and_grants_parsed() {
        let parsed = parse("#abc123@alice,file1,txt,,0", 1);
        assert_eq!(parsed.encryption_grants, vec![EncryptionGrant {
            encrypted_key: "abc123".to_string(),
            username: "alice".to_string(),
        }]);
        assert!(parsed.folders.is_empty());
        assert_eq!(folder_full_path(parsed.files[0].folder_index, &parsed.folders), "/");
    }

    #[test]
    fn legacy_bare_has_no_header_and_no_folders() {
        let parsed = parse("file1,txt,,0", 1);
        assert!(parsed.folders.is_empty());
        assert!(!parsed.auto_renew);
        assert_eq!(parsed.files[0].name.as_deref(), Some("file1"));
    }

    #[test]
    fn preset_folder_name_gets_its_reserved_index_not_a_sequential_one() {
        let parsed = parse("0|Documents|CustomFolder,a,txt,,0,b,txt.A,,0", 2);
        assert_eq!(parsed.folders[0].index, '2');
        assert_eq!(parsed.folders[1].index, '1');
    }

    #[test]
    fn unparseable_group_falls_back_to_empty_meta() {
        let parsed = parse("1|Docs,onlyname", 2);
        assert_eq!(parsed.files.len(), 2);
        assert!(parsed.files[1].name.is_none());
    }
}
