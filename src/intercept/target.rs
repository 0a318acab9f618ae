use semver::Version;
use std::fmt;
use tracing::debug;

/// One patchable entry point: `container.attribute`, gated on the version of
/// its root library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptionTarget {
    container: String,
    attribute: String,
    root: String,
    min_version: Option<Version>,
    max_version: Option<Version>,
}

impl InterceptionTarget {
    pub fn new(
        container: impl Into<String>,
        attribute: impl Into<String>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            attribute: attribute.into(),
            root: root.into(),
            min_version: None,
            max_version: None,
        }
    }

    /// Inclusive lower bound. An unparsable bound is ignored.
    pub fn with_min_version(mut self, version: &str) -> Self {
        self.min_version = parse_version(version);
        self
    }

    /// Inclusive upper bound. An unparsable bound is ignored.
    pub fn with_max_version(mut self, version: &str) -> Self {
        self.max_version = parse_version(version);
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn min_version(&self) -> Option<&Version> {
        self.min_version.as_ref()
    }

    pub fn max_version(&self) -> Option<&Version> {
        self.max_version.as_ref()
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.container, self.attribute)
    }

    /// Whether an installed root library version falls inside the bounds.
    /// Versions that can't be parsed are never compatible.
    pub fn supports(&self, installed: &str) -> bool {
        let Some(version) = parse_version(installed) else {
            debug!("Unparsable version {:?} for {}", installed, self.root);
            return false;
        };
        if let Some(min) = &self.min_version {
            if &version < min {
                return false;
            }
        }
        if let Some(max) = &self.max_version {
            if &version > max {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for InterceptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.container, self.attribute)
    }
}

/// Lenient semver: strips a leading `v` and pads `1` / `1.2` to three parts.
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    // Split off any pre-release / build suffix before padding.
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    Version::parse(&padded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_parsing() {
        assert_eq!(parse_version("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version("v1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(parse_version("2"), Some(Version::new(2, 0, 0)));
        assert!(parse_version("1.0-beta.1").is_some());
        assert!(parse_version("not-a-version").is_none());
        assert!(parse_version("1..2").is_none());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let target = InterceptionTarget::new("openai.Completions", "create", "openai")
            .with_min_version("1.0.0")
            .with_max_version("1.99");

        assert!(!target.supports("0.28.1"));
        assert!(target.supports("1.0.0"));
        assert!(target.supports("1.45.0"));
        assert!(target.supports("1.99.0"));
        assert!(!target.supports("2.0.0"));
        assert!(!target.supports("garbage"));
    }

    #[test]
    fn test_unbounded_target_accepts_any_parsable_version() {
        let target = InterceptionTarget::new("m", "f", "lib");
        assert!(target.supports("0.0.1"));
        assert_eq!(target.qualified_name(), "m.f");
        assert_eq!(target.to_string(), "m.f");
    }
}
