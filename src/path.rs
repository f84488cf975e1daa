//! Combined path splitting
//!
//! A combined path names an archive and a node inside it:
//! `"Map.nx/Obj/guide.img/common/post/0"`. The extension may be omitted
//! (`"Map/Obj/..."`). Splitting follows three rules, first match wins:
//!
//! 1. The first occurrence of `".nx/"` ends the archive name (the `.nx` is
//!    kept), even when it sits inside what looks like a later segment.
//! 2. Otherwise the first `/` ends the archive name and `.nx` is appended.
//! 3. Otherwise the archive name is empty and the whole input is the
//!    in-archive path.

/// Archive extension including the dot
pub const ARCHIVE_EXTENSION: &str = ".nx";

const ARCHIVE_MARKER: &str = ".nx/";

/// Split a combined path into (archive name, in-archive remainder)
pub fn split_path(path: &str) -> (String, &str) {
    if let Some(pos) = path.find(ARCHIVE_MARKER) {
        let end = pos + ARCHIVE_EXTENSION.len();
        return (path[..end].to_string(), &path[end + 1..]);
    }

    if let Some(pos) = path.find('/') {
        return (
            format!("{}{}", &path[..pos], ARCHIVE_EXTENSION),
            &path[pos + 1..],
        );
    }

    (String::new(), path)
}

/// Non-empty `/`-separated segments of an in-archive path
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// A combined path after splitting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub archive: String,
    pub segments: Vec<String>,
}

impl ResolvedPath {
    pub fn parse(path: &str) -> Self {
        let (archive, rest) = split_path(path);
        Self {
            archive,
            segments: segments(rest).map(str::to_string).collect(),
        }
    }
}
