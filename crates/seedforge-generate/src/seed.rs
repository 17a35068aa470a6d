use std::fmt;

/// Deterministic seed string for a generation site.
///
/// Segments are joined with `/`: the run seed first, then model path
/// segments, row indices, field names and retry counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeedPath {
    value: String,
}

impl SeedPath {
    pub fn new(run_seed: impl Into<String>) -> Self {
        Self {
            value: run_seed.into(),
        }
    }

    /// Seed for `run_seed` followed by every segment of `path`.
    pub fn for_path(run_seed: &str, path: &[PathSegment]) -> Self {
        path.iter()
            .fold(Self::new(run_seed), |seed, segment| seed.segment(segment))
    }

    pub fn segment(&self, segment: impl fmt::Display) -> Self {
        Self {
            value: format!("{}/{}", self.value, segment),
        }
    }

    pub fn index(&self, index: usize) -> Self {
        self.segment(index)
    }

    pub fn field(&self, field: &str) -> Self {
        self.segment(field)
    }

    pub fn retry(&self, field: &str, counter: u32) -> Self {
        self.field(field).segment(counter)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for SeedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Segment of a model path: a model or field name, or a row index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Name(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Name(name) => f.write_str(name),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Render a model path as `a/0/b` for diagnostics.
pub fn display_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_row_field_and_retry_seeds() {
        let path = vec![
            PathSegment::Name("User".into()),
            PathSegment::Index(1),
            PathSegment::Name("posts".into()),
        ];
        let row = SeedPath::for_path("0", &path).index(2);
        assert_eq!(row.as_str(), "0/User/1/posts/2");
        assert_eq!(row.field("title").as_str(), "0/User/1/posts/2/title");
        assert_eq!(row.retry("title", 1).as_str(), "0/User/1/posts/2/title/1");
        assert_eq!(display_path(&path), "User/1/posts");
    }
}
