use std::fmt;

/// Ant-style request path pattern.
///
/// Supported forms:
/// - `/**` matches every path
/// - `/actuator/**` matches `/actuator` and anything below it
/// - `/api/*/topics` where `*` matches exactly one segment
/// - literal paths such as `/rocketmq-dashboard/csrf-token`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    Single,
    Any,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|segment| match segment {
                "**" => Segment::Any,
                "*" => Segment::Single,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check whether a request path (without query string) matches this pattern
    pub fn matches(&self, path: &str) -> bool {
        let path: Vec<&str> = split_segments(path).collect();
        match_segments(&self.segments, &path)
    }
}

impl From<&str> for PathPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::Any, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((Segment::Single, rest)) => !path.is_empty() && match_segments(rest, &path[1..]),
        Some((Segment::Literal(literal), rest)) => {
            path.first().is_some_and(|segment| segment == literal)
                && match_segments(rest, &path[1..])
        }
    }
}
