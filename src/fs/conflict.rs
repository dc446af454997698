//! Resolution of file/directory name conflicts.
//!
//! A base name can be backed by a plain object (`dir/foo`, a file or symlink)
//! and by a directory (`dir/foo/` marker, or implicitly by descendants such as
//! `dir/foo/bar`) at the same time. When both are present the directory wins
//! the plain name and the file is exposed under `foo + suffix`.

use super::{ChildEntry, ChildKind};
use crate::store::ObjectMetadata;

/// The directory side of a base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirCandidate {
    /// Backed by a `name/` marker object.
    Explicit(ObjectMetadata),
    /// Inferred from descendant objects only.
    Implicit,
}

/// Everything found for one base name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    pub directory: Option<DirCandidate>,
    /// Plain object: a regular file or a symlink.
    pub file: Option<ObjectMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    NotFound,
    Single(ChildEntry),
    Conflict {
        /// The directory, under the plain base name.
        primary: ChildEntry,
        /// The file or symlink, under the suffixed name.
        secondary: ChildEntry,
    },
}

impl Resolution {
    /// Entry visible under the plain base name.
    pub fn primary(&self) -> Option<&ChildEntry> {
        match self {
            Resolution::NotFound => None,
            Resolution::Single(entry) => Some(entry),
            Resolution::Conflict { primary, .. } => Some(primary),
        }
    }

    pub fn into_secondary(self) -> Option<ChildEntry> {
        match self {
            Resolution::Conflict { secondary, .. } => Some(secondary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConflictResolver {
    suffix: String,
    implicit_dirs: bool,
}

impl ConflictResolver {
    pub fn new(suffix: impl Into<String>, implicit_dirs: bool) -> Self {
        Self {
            suffix: suffix.into(),
            implicit_dirs,
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn implicit_dirs(&self) -> bool {
        self.implicit_dirs
    }

    pub fn conflicting_name(&self, base: &str) -> String {
        format!("{}{}", base, self.suffix)
    }

    /// The base name if `name` carries the conflict suffix.
    pub fn strip_suffix<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_suffix(self.suffix.as_str())
            .filter(|base| !base.is_empty())
    }

    pub fn resolve(&self, base: &str, candidates: Candidates) -> Resolution {
        let directory = match candidates.directory {
            Some(DirCandidate::Implicit) if !self.implicit_dirs => None,
            Some(DirCandidate::Explicit(metadata)) => {
                Some(ChildEntry::new(base, ChildKind::Directory, Some(metadata)))
            }
            Some(DirCandidate::Implicit) => Some(ChildEntry::new(base, ChildKind::Directory, None)),
            None => None,
        };

        match (directory, candidates.file) {
            (None, None) => Resolution::NotFound,
            (Some(dir), None) => Resolution::Single(dir),
            (None, Some(file)) => Resolution::Single(ChildEntry::from_object(base, file)),
            (Some(dir), Some(file)) => Resolution::Conflict {
                primary: dir,
                secondary: ChildEntry::from_object(&self.conflicting_name(base), file),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SYMLINK_TARGET_KEY;
    use std::collections::BTreeMap;
    use std::time::SystemTime;

    const SUFFIX: &str = "\n";

    fn object(name: &str) -> ObjectMetadata {
        ObjectMetadata {
            name: name.to_string(),
            size: 4,
            generation: 1,
            meta_generation: 1,
            updated: SystemTime::UNIX_EPOCH,
            metadata: BTreeMap::new(),
        }
    }

    fn symlink(name: &str) -> ObjectMetadata {
        let mut o = object(name);
        o.size = 0;
        o.metadata
            .insert(SYMLINK_TARGET_KEY.to_string(), "target".to_string());
        o
    }

    #[test]
    fn test_nothing_is_not_found() {
        let resolver = ConflictResolver::new(SUFFIX, true);
        assert_eq!(resolver.resolve("foo", Candidates::default()), Resolution::NotFound);
    }

    #[test]
    fn test_single_file() {
        let resolver = ConflictResolver::new(SUFFIX, false);
        let res = resolver.resolve(
            "foo",
            Candidates {
                directory: None,
                file: Some(object("dir/foo")),
            },
        );
        let entry = res.primary().unwrap();
        assert_eq!(entry.name, "foo");
        assert_eq!(entry.kind, ChildKind::File);
        assert_eq!(entry.metadata.as_ref().unwrap().size, 4);
    }

    #[test]
    fn test_single_symlink() {
        let resolver = ConflictResolver::new(SUFFIX, false);
        let res = resolver.resolve(
            "foo",
            Candidates {
                directory: None,
                file: Some(symlink("foo")),
            },
        );
        assert_eq!(res.primary().unwrap().kind, ChildKind::Symlink);
    }

    #[test]
    fn test_directory_wins_conflict() {
        let resolver = ConflictResolver::new(SUFFIX, false);
        let res = resolver.resolve(
            "foo",
            Candidates {
                directory: Some(DirCandidate::Explicit(object("foo/"))),
                file: Some(object("foo")),
            },
        );
        match res {
            Resolution::Conflict { primary, secondary } => {
                assert_eq!(primary.name, "foo");
                assert_eq!(primary.kind, ChildKind::Directory);
                assert_eq!(secondary.name, "foo\n");
                assert_eq!(secondary.kind, ChildKind::File);
            }
            other => panic!("Expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_implicit_directory_respects_flag() {
        let candidates = Candidates {
            directory: Some(DirCandidate::Implicit),
            file: Some(object("foo")),
        };

        let enabled = ConflictResolver::new(SUFFIX, true);
        assert!(matches!(
            enabled.resolve("foo", candidates.clone()),
            Resolution::Conflict { .. }
        ));

        let disabled = ConflictResolver::new(SUFFIX, false);
        let res = disabled.resolve("foo", candidates);
        assert_eq!(res.primary().unwrap().kind, ChildKind::File);
        assert!(res.into_secondary().is_none());

        let only_implicit = Candidates {
            directory: Some(DirCandidate::Implicit),
            file: None,
        };
        assert_eq!(disabled.resolve("foo", only_implicit), Resolution::NotFound);
    }

    #[test]
    fn test_strip_suffix() {
        let resolver = ConflictResolver::new("~c", false);
        assert_eq!(resolver.strip_suffix("foo~c"), Some("foo"));
        assert_eq!(resolver.strip_suffix("foo"), None);
        assert_eq!(resolver.strip_suffix("~c"), None);
        assert_eq!(resolver.conflicting_name("foo"), "foo~c");
    }
}
