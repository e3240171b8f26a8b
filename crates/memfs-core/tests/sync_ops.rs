// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Blocking call convention against whole trees

mod common;

use memfs_core::{
    ErrorCode, FileData, FsConfig, MkdirOptions, OpenFlags, ReadFileOptions, ReaddirOptions,
    RmOptions, RmdirOptions, Volume, WriteFileOptions,
};
use serde_json::json;

#[test]
fn mkdir_creates_only_the_leaf() {
    let vol = common::volume(json!({ "parent": null }));
    let before = vol.to_json("/").unwrap();

    let err = vol.mkdir("/parent/missing/leaf", &MkdirOptions::default()).unwrap_err();
    assert!(err.is(ErrorCode::NotFound));
    assert_eq!(vol.to_json("/").unwrap(), before);

    vol.mkdir("/parent/leaf", &MkdirOptions::default()).unwrap();
    assert_eq!(vol.to_json("/").unwrap(), json!({ "parent": { "leaf": null } }));
}

#[test]
fn recursive_mkdir_is_idempotent_over_existing_directories() {
    let vol = common::volume(json!({}));
    let created = vol.mkdir("/x/y/z", &MkdirOptions::recursive()).unwrap();
    assert_eq!(created.as_deref(), Some("/x"));

    let snapshot = vol.to_json("/").unwrap();
    assert_eq!(vol.mkdir("/x/y/z", &MkdirOptions::recursive()).unwrap(), None);
    assert_eq!(vol.to_json("/").unwrap(), snapshot);
}

#[test]
fn paths_through_a_file_fail_not_a_directory() {
    let vol = common::volume(json!({ "file": "content" }));

    let checks: Vec<(&str, ErrorCode)> = vec![
        ("mkdir", vol.mkdir("/file/folder", &MkdirOptions::default()).unwrap_err().code()),
        ("mkdir -p", vol.mkdir("/file/a/b", &MkdirOptions::recursive()).unwrap_err().code()),
        ("rmdir", vol.rmdir("/file/x", &RmdirOptions::default()).unwrap_err().code()),
        ("rm", vol.rm("/file/x", &RmOptions::force()).unwrap_err().code()),
        ("unlink", vol.unlink("/file/x").unwrap_err().code()),
        ("open", vol.open("/file/x", OpenFlags::write_truncate()).unwrap_err().code()),
        (
            "readFile",
            vol.read_file("/file/x", &ReadFileOptions::default()).unwrap_err().code(),
        ),
        (
            "writeFile",
            vol.write_file("/file/x", "y", &WriteFileOptions::default())
                .unwrap_err()
                .code(),
        ),
        ("truncate", vol.truncate("/file/x", 0).unwrap_err().code()),
        (
            "readdir",
            vol.readdir("/file/x", &ReaddirOptions::default()).unwrap_err().code(),
        ),
        ("mkdtemp", vol.mkdtemp("/file/tmp-").unwrap_err().code()),
    ];
    for (op, code) in checks {
        assert_eq!(code, ErrorCode::NotADirectory, "{op}");
    }
}

#[test]
fn rmdir_refuses_non_empty_and_recursive_spares_siblings() {
    let vol = common::volume(json!({
        "target": { "a": "1", "nested": { "b": "2" } },
        "sibling": { "c": "3" },
    }));
    let before = vol.to_json("/").unwrap();

    let err = vol.rmdir("/target", &RmdirOptions::default()).unwrap_err();
    assert_eq!(err.code().as_str(), "ENOTEMPTY");
    assert_eq!(vol.to_json("/").unwrap(), before);

    vol.rmdir("/target", &RmdirOptions::recursive()).unwrap();
    assert_eq!(vol.to_json("/").unwrap(), json!({ "sibling": { "c": "3" } }));
}

#[test]
fn rm_force_on_missing_path_is_a_no_op() {
    let vol = common::volume(json!({ "keep": "1" }));
    let before = vol.inode_count();

    vol.rm("/gone", &RmOptions::force()).unwrap();
    assert_eq!(vol.inode_count(), before);

    let err = vol.rm("/gone", &RmOptions::default()).unwrap_err();
    assert!(err.is(ErrorCode::NotFound));
    assert_eq!(err.to_string(), "ENOENT: no such file or directory, rm '/gone'");
}

#[test]
fn unlink_never_removes_directories() {
    let vol = common::volume(json!({ "dir": { "f": "1" }, "file": "2" }));
    assert!(vol.unlink("/dir").unwrap_err().is(ErrorCode::IsADirectory));
    assert!(vol.exists("/dir/f"));

    vol.link("/file", "/hard").unwrap();
    vol.unlink("/file").unwrap();
    assert_eq!(
        vol.read_file("/hard", &ReadFileOptions::utf8()).unwrap(),
        "2"
    );
    assert_eq!(vol.stat("/hard").unwrap().nlink, 1);
}

#[test]
fn closed_descriptors_fail_bad_descriptor_and_are_reused() {
    let vol = common::volume(json!({ "f": "abc" }));
    let fd = vol.open("/f", OpenFlags::read_write()).unwrap();
    let other = vol.open("/f", OpenFlags::read_only()).unwrap();
    vol.close(fd).unwrap();

    for code in [
        vol.read(fd, 1).unwrap_err().code(),
        vol.write(fd, b"x").unwrap_err().code(),
        vol.ftruncate(fd, 0).unwrap_err().code(),
        vol.fstat(fd).unwrap_err().code(),
    ] {
        assert_eq!(code, ErrorCode::BadDescriptor);
    }

    let again = vol.open("/f", OpenFlags::read_only()).unwrap();
    assert_eq!(again, fd);
    assert_ne!(again, other);
}

#[test]
fn truncate_pads_with_zeros_and_discards_tail() {
    let vol = common::volume(json!({ "file": "123" }));

    vol.truncate("/file", 6).unwrap();
    let grown = vol.read_file("/file", &ReadFileOptions::default()).unwrap();
    assert_eq!(grown, FileData::Bytes(b"123\0\0\0".to_vec()));

    vol.truncate("/file", 2).unwrap();
    assert_eq!(vol.read_file("file", &ReadFileOptions::utf8()).unwrap(), "12");
}

#[test]
fn ftruncate_to_current_length_keeps_content() {
    let vol = common::volume(json!({ "file": "123" }));
    let fd = vol.open("/file", OpenFlags::read_write()).unwrap();
    vol.ftruncate(fd, 3).unwrap();
    vol.close(fd).unwrap();
    assert_eq!(vol.read_file("/file", &ReadFileOptions::utf8()).unwrap(), "123");
}

#[test]
fn readdir_with_file_types_reports_each_child_once() {
    let vol = common::volume(json!({}));
    vol.write_file("/f.html", "<html>", &WriteFileOptions::default()).unwrap();
    vol.mkdir("/empty-folder", &MkdirOptions::default()).unwrap();
    vol.mkdir("/folder", &MkdirOptions::default()).unwrap();

    let listing = vol.readdir("/", &ReaddirOptions::with_file_types()).unwrap();
    let entries = listing.entries().unwrap();
    assert_eq!(entries.len(), 3);
    for entry in entries {
        match entry.name.as_str() {
            "f.html" => assert!(entry.is_file() && !entry.is_directory()),
            "folder" | "empty-folder" => assert!(entry.is_directory()),
            other => panic!("unexpected entry {other}"),
        }
    }
}

#[test]
fn recursive_rm_leaves_expected_tree() {
    let vol = common::volume(json!({ "folder": { "file": "test" }, "empty-folder": null }));
    vol.rm("/folder", &RmOptions::recursive()).unwrap();
    assert_eq!(vol.to_json("/").unwrap(), json!({ "empty-folder": null }));
}

#[test]
fn append_file_accumulates() {
    let vol = common::volume(json!({}));
    vol.append_file("/test.txt", "a", &WriteFileOptions::default()).unwrap();
    vol.append_file("/test.txt", "b", &WriteFileOptions::default()).unwrap();
    assert_eq!(vol.read_file("/test.txt", &ReadFileOptions::utf8()).unwrap(), "ab");
}

#[test]
fn config_from_toml_drives_limits() {
    let config = FsConfig::from_toml_str(
        r#"
        [limits]
        max-open-files = 1
        max-symlink-hops = 2

        [temp]
        suffix-len = 10
        "#,
    )
    .unwrap();
    let vol = Volume::new(config);
    vol.write_file("/target", "x", &WriteFileOptions::default()).unwrap();
    vol.symlink("/target", "/l1").unwrap();
    vol.symlink("/l1", "/l2").unwrap();
    vol.symlink("/l2", "/l3").unwrap();

    assert!(vol.stat("/l2").is_ok());
    assert!(vol.stat("/l3").unwrap_err().is(ErrorCode::Loop));

    let _fd = vol.open("/target", OpenFlags::read_only()).unwrap();
    assert!(vol
        .open("/target", OpenFlags::read_only())
        .unwrap_err()
        .is(ErrorCode::TooManyOpenFiles));

    vol.mkdir("/tmp", &MkdirOptions::default()).unwrap();
    assert_eq!(vol.mkdtemp("/tmp/t").unwrap().len(), "/tmp/t".len() + 10);
}
