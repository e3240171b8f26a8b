// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Tree snapshots as JSON
//!
//! An object is a directory, a string is a UTF-8 file and `null` is an empty
//! directory. Object keys may contain `/`; missing ancestors are created.

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::FsConfig;
use crate::error::{CodeResult, ErrorCode, FsResult};
use crate::inode::InodeData;
use crate::types::{FileKind, InodeId};
use crate::volume::{State, Volume, COMPONENT};

impl Volume {
    /// Fresh volume populated from a JSON tree
    pub fn from_json(value: &Value, config: FsConfig) -> FsResult<Self> {
        let volume = Volume::new(config);
        volume.load_json("/", value)?;
        Ok(volume)
    }

    /// Merge a JSON tree into the volume below `base`. Existing files named
    /// by the tree are overwritten.
    pub fn load_json(&self, base: &str, value: &Value) -> FsResult<()> {
        debug!(component = COMPONENT, op = "load_json", path = base);
        if !value.is_object() {
            return Err(ErrorCode::InvalidArgument.at("load_json", base));
        }
        let modes = self.config().modes.clone();
        self.with_state(|state| load_value(state, base, value, modes.file, modes.directory))
            .map_err(|e| e.at("load_json", base))
    }

    /// Snapshot of the subtree at `path`. Symlinks are left out.
    pub fn to_json(&self, path: &str) -> FsResult<Value> {
        self.with_state(|state| {
            let id = state.resolve(path, true)?.existing()?;
            dump(state, id)
        })
        .map_err(|e| e.at("to_json", path))
    }
}

fn join(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

fn load_value(
    state: &mut State,
    path: &str,
    value: &Value,
    file_mode: u32,
    dir_mode: u32,
) -> CodeResult<()> {
    match value {
        Value::Null => state.mkdir_recursive(path, dir_mode).map(|_| ()),
        Value::Object(entries) => {
            state.mkdir_recursive(path, dir_mode)?;
            for (key, child) in entries {
                load_value(state, &join(path, key), child, file_mode, dir_mode)?;
            }
            Ok(())
        }
        Value::String(text) => {
            if let Some((parent, _)) = path.rsplit_once('/') {
                // a file standing where a parent directory is needed
                state.mkdir_recursive(parent, dir_mode).map_err(|e| match e {
                    ErrorCode::AlreadyExists => ErrorCode::NotADirectory,
                    other => other,
                })?;
            }
            let target = state.resolve(path, true)?;
            match target.inode {
                Some(id) => {
                    let node = state.store.node_mut(id)?;
                    *node.bytes_mut()? = text.as_bytes().to_vec();
                    node.touch_modified();
                }
                None => {
                    state.store.create_file(
                        target.dir,
                        &target.name,
                        file_mode,
                        text.as_bytes().to_vec(),
                    )?;
                }
            }
            Ok(())
        }
        _ => Err(ErrorCode::InvalidArgument),
    }
}

fn dump(state: &State, id: InodeId) -> CodeResult<Value> {
    let node = state.store.node(id)?;
    match &node.data {
        InodeData::File(bytes) => Ok(Value::String(String::from_utf8_lossy(bytes).into_owned())),
        InodeData::Symlink(_) => Ok(Value::Null),
        InodeData::Directory(children) => {
            let mut map = Map::new();
            for (name, child) in children {
                if state.store.node(*child)?.kind() == FileKind::Symlink {
                    continue;
                }
                map.insert(name.clone(), dump(state, *child)?);
            }
            Ok(if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_shapes() {
        let tree = json!({
            "folder": { "file": "test" },
            "empty-folder": null,
            "deep/nested/a.txt": "a",
        });
        let volume = Volume::from_json(&tree, FsConfig::default()).unwrap();

        assert_eq!(
            volume.to_json("/").unwrap(),
            json!({
                "deep": { "nested": { "a.txt": "a" } },
                "empty-folder": null,
                "folder": { "file": "test" },
            })
        );
        assert_eq!(volume.to_json("/folder/file").unwrap(), json!("test"));
    }

    #[test]
    fn test_rejects_non_tree_values() {
        let err = Volume::from_json(&json!({ "n": 5 }), FsConfig::default()).unwrap_err();
        assert!(err.is(ErrorCode::InvalidArgument));

        let volume = Volume::default();
        assert!(volume
            .load_json("/", &json!(["a"]))
            .unwrap_err()
            .is(ErrorCode::InvalidArgument));
    }

    #[test]
    fn test_load_overwrites_and_merges() {
        let volume = Volume::from_json(&json!({ "a/b.txt": "old" }), FsConfig::default()).unwrap();
        volume
            .load_json("/a", &json!({ "b.txt": "new", "c": null }))
            .unwrap();
        assert_eq!(volume.to_json("/a").unwrap(), json!({ "b.txt": "new", "c": null }));
    }

    #[test]
    fn test_string_through_file_is_not_a_directory() {
        let err = Volume::from_json(&json!({ "f": "x", "f/g": "y" }), FsConfig::default())
            .unwrap_err();
        assert!(err.is(ErrorCode::NotADirectory));
    }

    #[test]
    fn test_symlinks_are_omitted() {
        let volume = Volume::from_json(&json!({ "a": "1" }), FsConfig::default()).unwrap();
        volume.symlink("/a", "/b").unwrap();
        assert_eq!(volume.to_json("/").unwrap(), json!({ "a": "1" }));
    }
}
