// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rstest::rstest;

use super::VfsPath;

#[rstest]
#[case("", "")]
#[case("/", "/")]
#[case("//", "/")]
#[case("/a/b/c", "/a/b/c")]
#[case("/a/b/c/", "/a/b/c")]
#[case("a//b///c", "a/b/c")]
#[case("\\a\\b\\c", "/a/b/c")]
#[case("/a/./b", "/a/b")]
#[case("/a/b/..", "/a")]
#[case("/a/../../b", "/b")]
#[case("/..", "/")]
#[case("/../..", "/")]
#[case("..", "..")]
#[case("a/../../b", "../b")]
#[case("./", "")]
#[case("a/.", "a")]
fn test_canonicalization(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(VfsPath::new(input).as_str(), expected);
}

#[rstest]
fn test_canonicalization_idempotent() {
    let samples = [
        "", "/", "a", "/a", "a/b/../c", "\\x\\y", "//a//", "/a/./b/..", "..", "../../x",
    ];
    for sample in samples {
        let once = VfsPath::new(sample);
        let twice = VfsPath::new(once.as_str());
        assert_eq!(once, twice, "canonicalizing {sample:?} twice changed it");
    }
}

#[rstest]
#[case("/a", "b", "/a/b")]
#[case("/a", "/b", "/b")]
#[case("", "b/c", "b/c")]
#[case("/a", "", "/a")]
#[case("/a", "../b", "/b")]
#[case("/", "a", "/a")]
fn test_join(#[case] base: &str, #[case] other: &str, #[case] expected: &str) {
    let base = VfsPath::new(base);
    assert_eq!((&base / other).as_str(), expected);
}

#[rstest]
fn test_join_operator_with_path() {
    let base = VfsPath::new("/data");
    let rel = VfsPath::new("logs/app.log");
    assert_eq!((&base / &rel).as_str(), "/data/logs/app.log");
}

#[rstest]
fn test_join_stays_in_directory() {
    let base = VfsPath::new("/mnt/store");
    for other in ["a", "a/b", "a/./b", "deep/er/still"] {
        let joined = &base / other;
        assert!(
            joined.is_in_directory(&base, true),
            "{joined} should be under {base}"
        );
    }
}

#[rstest]
#[case("/a/b/c", "/a/b")]
#[case("/a", "/")]
#[case("/", "")]
#[case("a/b", "a")]
#[case("a", "")]
#[case("", "")]
fn test_parent(#[case] path: &str, #[case] expected: &str) {
    assert_eq!(VfsPath::new(path).parent().as_str(), expected);
}

#[rstest]
#[case("/a/b/c.txt", "c.txt", "c", Some(".txt"))]
#[case("/a/b", "b", "b", None)]
#[case("/archive.tar.gz", "archive.tar.gz", "archive.tar", Some(".gz"))]
#[case("/", "", "", None)]
#[case("name.", "name.", "name", Some("."))]
fn test_name_queries(
    #[case] path: &str,
    #[case] name: &str,
    #[case] stem: &str,
    #[case] ext: Option<&str>,
) {
    let path = VfsPath::new(path);
    assert_eq!(path.file_name(), name);
    assert_eq!(path.file_stem(), stem);
    assert_eq!(path.extension_with_dot(), ext);
}

#[rstest]
#[case("/a/b.txt", "/", false, true)]
#[case("/sub/a.log", "/", false, false)]
#[case("/sub/a.log", "/", true, true)]
#[case("/a/b/c", "/a", true, true)]
#[case("/a/b/c", "/a", false, false)]
#[case("/a/b", "/a", false, true)]
#[case("/ab", "/a", true, false)]
#[case("/a", "/a", false, true)]
#[case("/b/c", "/a", true, false)]
fn test_is_in_directory(
    #[case] path: &str,
    #[case] dir: &str,
    #[case] recursive: bool,
    #[case] expected: bool,
) {
    let path = VfsPath::new(path);
    let dir = VfsPath::new(dir);
    assert_eq!(path.is_in_directory(&dir, recursive), expected);
}

#[rstest]
fn test_to_relative() {
    assert_eq!(VfsPath::new("/a/b").to_relative().as_str(), "a/b");
    assert_eq!(VfsPath::new("a/b").to_relative().as_str(), "a/b");
    assert_eq!(VfsPath::root().to_relative().as_str(), "");
}

#[rstest]
fn test_check_absolute() {
    assert!(VfsPath::new("/a").check_absolute().is_ok());
    assert!(VfsPath::new("a").check_absolute().is_err());
    assert!(VfsPath::new("").check_absolute().is_err());
}

#[rstest]
fn test_parent_of_root_join() {
    let root = VfsPath::root();
    assert_eq!((&root / "..").as_str(), "/");
}

#[rstest]
fn test_equality_and_hash() {
    let a = VfsPath::new("/a//b/./c");
    let b = VfsPath::new("\\a\\b\\c");
    assert_eq!(a, b);

    let hash = |p: &VfsPath| {
        let mut hasher = DefaultHasher::new();
        p.hash(&mut hasher);
        hasher.finish()
    };
    assert_eq!(hash(&a), hash(&b));

    let c = VfsPath::new("/a/b/d");
    assert_ne!(a, c);
}

#[rstest]
fn test_segments() {
    let path = VfsPath::new("/a/b/c");
    let segments: Vec<_> = path.segments().collect();
    assert_eq!(segments, vec!["a", "b", "c"]);
    assert_eq!(VfsPath::root().segments().count(), 0);
}
