use object_store::path::Path;

/// Location of a blob inside an object store.
///
/// References are composed starting from a root with [`BlobRef::child`], each
/// `/` separated segment of a child becomes a path level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BlobRef {
    path: Path,
}

impl BlobRef {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a `/` separated path, returning an error on illegal segments
    /// (e.g. `..` or empty segments).
    pub fn parse(path: &str) -> Result<Self, object_store::path::Error> {
        Ok(Self {
            path: Path::parse(path)?,
        })
    }

    pub fn child(&self, name: &str) -> Self {
        let path = name
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.path.clone(), |path, segment| path.child(segment));
        Self { path }
    }

    /// Last segment of the reference, if any.
    pub fn name(&self) -> Option<&str> {
        self.path.filename()
    }

    pub fn full_path(&self) -> String {
        self.path.to_string()
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }
}

impl From<Path> for BlobRef {
    fn from(path: Path) -> Self {
        Self { path }
    }
}

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_composition() {
        let root = BlobRef::parse("images").unwrap();
        let file = root.child("shops/2024").child("front.jpg");

        assert_eq!(file.full_path(), "images/shops/2024/front.jpg");
        assert_eq!(file.name(), Some("front.jpg"));
    }

    #[test]
    fn empty_segments_are_skipped() {
        let file = BlobRef::root().child("/a//b/");
        assert_eq!(file.full_path(), "a/b");
    }

    #[test]
    fn rejects_illegal_paths() {
        assert!(BlobRef::parse("a/../b").is_err());
    }
}
