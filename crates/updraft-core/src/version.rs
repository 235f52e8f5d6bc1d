use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComponent {
    Major,
    Minor,
    Patch,
}

impl fmt::Display for VersionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidVersionFormat {
    #[error("Expected MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD], got: {input}")]
    Shape { input: String },
    #[error("Invalid {component} version: {value}")]
    Component {
        component: VersionComponent,
        value: String,
    },
    #[error("Invalid prerelease identifier: {value}")]
    Prerelease { value: String },
    #[error("Invalid build metadata: {value}")]
    Build { value: String },
}

/// A parsed `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]` version.
///
/// Ordering compares the numeric core first; at an equal core a release is
/// strictly greater than any prerelease, and two prereleases compare by a
/// numeric-aware walk over the full prerelease string (digit runs compare as
/// numbers, everything else byte-wise). Build metadata is carried for display
/// but participates in neither ordering, equality, nor hashing.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

impl SemanticVersion {
    /// Parse a version string.
    ///
    /// # Errors
    /// Returns [`InvalidVersionFormat`] when the string does not match the
    /// `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]` grammar, including multi-digit
    /// numeric components with leading zeros.
    pub fn parse(input: &str) -> Result<Self, InvalidVersionFormat> {
        input.parse()
    }

    /// The comparable form of this version: everything except build metadata.
    /// Used as the storage key so versions differing only in build share
    /// local state.
    #[must_use]
    pub fn comparable(&self) -> String {
        match &self.prerelease {
            Some(prerelease) => {
                format!("{}.{}.{}-{prerelease}", self.major, self.minor, self.patch)
            }
            None => format!("{}.{}.{}", self.major, self.minor, self.patch),
        }
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.major == other.major
            && self.minor == other.minor
            && self.patch == other.patch
            && self.prerelease == other.prerelease
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.prerelease.hash(state);
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => natural_cmp(a, b),
            })
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(prerelease) = &self.prerelease {
            write!(f, "-{prerelease}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl FromStr for SemanticVersion {
    type Err = InvalidVersionFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);

        let (rest, build) = match s.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (s, None),
        };
        let (core, prerelease) = match rest.split_once('-') {
            Some((core, prerelease)) => (core, Some(prerelease)),
            None => (rest, None),
        };

        let mut parts = core.split('.');
        let shape_error = || InvalidVersionFormat::Shape {
            input: s.to_string(),
        };
        let major_str = parts.next().ok_or_else(shape_error)?;
        let minor_str = parts.next().ok_or_else(shape_error)?;
        let patch_str = parts.next().ok_or_else(shape_error)?;
        if parts.next().is_some() {
            return Err(shape_error());
        }

        let major = parse_numeric(major_str, VersionComponent::Major)?;
        let minor = parse_numeric(minor_str, VersionComponent::Minor)?;
        let patch = parse_numeric(patch_str, VersionComponent::Patch)?;

        let prerelease = prerelease
            .map(|p| validate_prerelease(p).map(|()| p.to_string()))
            .transpose()?;
        let build = build
            .map(|b| validate_build(b).map(|()| b.to_string()))
            .transpose()?;

        Ok(Self {
            major,
            minor,
            patch,
            prerelease,
            build,
        })
    }
}

fn parse_numeric(value: &str, component: VersionComponent) -> Result<u64, InvalidVersionFormat> {
    let invalid = || InvalidVersionFormat::Component {
        component,
        value: value.to_string(),
    };

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if value.len() > 1 && value.starts_with('0') {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}

fn validate_prerelease(prerelease: &str) -> Result<(), InvalidVersionFormat> {
    let invalid = || InvalidVersionFormat::Prerelease {
        value: prerelease.to_string(),
    };

    if prerelease.is_empty() {
        return Err(invalid());
    }
    for identifier in prerelease.split('.') {
        if identifier.is_empty()
            || !identifier
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(invalid());
        }
        // Numeric identifiers follow the same leading-zero rule as the core.
        if identifier.bytes().all(|b| b.is_ascii_digit())
            && identifier.len() > 1
            && identifier.starts_with('0')
        {
            return Err(invalid());
        }
    }
    Ok(())
}

fn validate_build(build: &str) -> Result<(), InvalidVersionFormat> {
    let invalid = || InvalidVersionFormat::Build {
        value: build.to_string(),
    };

    if build.is_empty() {
        return Err(invalid());
    }
    for identifier in build.split('.') {
        if identifier.is_empty()
            || !identifier
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Numeric-aware lexicographic comparison: digit runs compare as numbers,
/// everything else compares byte-wise, so `beta.2` sorts before `beta.10`.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut i = 0;
    let mut j = 0;

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let run_a = digit_run(a, i);
            let run_b = digit_run(b, j);
            let num_a = &a[i..run_a];
            let num_b = &b[j..run_b];
            let trimmed_a = trim_leading_zeros(num_a);
            let trimmed_b = trim_leading_zeros(num_b);

            let by_value = trimmed_a
                .len()
                .cmp(&trimmed_b.len())
                .then_with(|| trimmed_a.cmp(trimmed_b));
            if by_value != Ordering::Equal {
                return by_value;
            }
            // Equal values with different zero-padding still need a stable
            // answer so the ordering stays consistent with equality.
            let by_text = num_a.cmp(num_b);
            if by_text != Ordering::Equal {
                return by_text;
            }
            i = run_a;
            j = run_b;
        } else {
            let by_byte = a[i].cmp(&b[j]);
            if by_byte != Ordering::Equal {
                return by_byte;
            }
            i += 1;
            j += 1;
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

fn digit_run(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    end
}

fn trim_leading_zeros(digits: &[u8]) -> &[u8] {
    let first_nonzero = digits
        .iter()
        .position(|&b| b != b'0')
        .unwrap_or(digits.len() - 1);
    &digits[first_nonzero..]
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::{InvalidVersionFormat, SemanticVersion, natural_cmp};

    fn v(input: &str) -> SemanticVersion {
        input.parse().expect("test version should parse")
    }

    #[test]
    fn parse_plain_version() {
        let parsed = v("1.2.3");
        assert_eq!(parsed.major, 1);
        assert_eq!(parsed.minor, 2);
        assert_eq!(parsed.patch, 3);
        assert!(parsed.prerelease.is_none());
        assert!(parsed.build.is_none());
    }

    #[test]
    fn parse_with_prerelease_and_build() {
        let parsed = v("2.0.0-beta.1+build.42");
        assert_eq!(parsed.prerelease.as_deref(), Some("beta.1"));
        assert_eq!(parsed.build.as_deref(), Some("build.42"));
        assert_eq!(parsed.to_string(), "2.0.0-beta.1+build.42");
    }

    #[test]
    fn parse_tolerates_v_prefix_and_whitespace() {
        assert_eq!(v("  v1.4.0  "), v("1.4.0"));
    }

    #[test]
    fn parse_rejects_missing_components() {
        assert!(SemanticVersion::parse("1.2").is_err());
        assert!(SemanticVersion::parse("1").is_err());
        assert!(SemanticVersion::parse("1.2.3.4").is_err());
        assert!(SemanticVersion::parse("").is_err());
    }

    #[test]
    fn parse_rejects_non_numeric_components() {
        assert!(SemanticVersion::parse("invalid").is_err());
        assert!(SemanticVersion::parse("a.2.3").is_err());
        assert!(SemanticVersion::parse("1.b.3").is_err());
        assert!(SemanticVersion::parse("1.2.c").is_err());
    }

    #[test]
    fn parse_rejects_leading_zeros() {
        assert!(matches!(
            SemanticVersion::parse("01.2.3"),
            Err(InvalidVersionFormat::Component { .. })
        ));
        assert!(SemanticVersion::parse("1.02.3").is_err());
        assert!(SemanticVersion::parse("1.2.03").is_err());
        assert!(SemanticVersion::parse("1.2.3-01").is_err());
        assert!(SemanticVersion::parse("1.2.3-beta.01").is_err());
    }

    #[test]
    fn parse_allows_zero_components() {
        assert_eq!(v("0.0.0").to_string(), "0.0.0");
        assert_eq!(v("1.2.3-0").prerelease.as_deref(), Some("0"));
    }

    #[test]
    fn parse_rejects_empty_prerelease_or_build() {
        assert!(SemanticVersion::parse("1.2.3-").is_err());
        assert!(SemanticVersion::parse("1.2.3+").is_err());
        assert!(SemanticVersion::parse("1.2.3-beta..1").is_err());
    }

    #[test]
    fn ordering_is_numeric_per_component() {
        assert!(v("1.2.4") > v("1.2.3"));
        assert!(v("2.0.0") > v("1.2.4"));
        assert!(v("1.10.0") > v("1.9.9"));
    }

    #[test]
    fn release_beats_prerelease_at_equal_core() {
        assert!(v("2.0.0") > v("2.0.0-beta.1"));
        assert!(v("2.0.0-rc.1") < v("2.0.0"));
        // A newer core beats a release of the older core regardless of tags.
        assert!(v("2.0.1-alpha") > v("2.0.0"));
    }

    #[test]
    fn prerelease_comparison_is_numeric_aware() {
        assert!(v("1.0.0-beta.2") < v("1.0.0-beta.10"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert!(v("1.0.0-rc.1") > v("1.0.0-beta.9"));
        assert_eq!(v("1.0.0-beta.2").cmp(&v("1.0.0-beta.2")), Ordering::Equal);
    }

    #[test]
    fn build_metadata_ignored_for_ordering_and_equality() {
        assert_eq!(v("1.2.3+build.1"), v("1.2.3+build.2"));
        assert_eq!(v("1.2.3+build.1").cmp(&v("1.2.3")), Ordering::Equal);
        assert_eq!(v("1.2.3+build.9").comparable(), "1.2.3");
        assert_eq!(v("1.2.3-rc.1+build.9").comparable(), "1.2.3-rc.1");
    }

    #[test]
    fn natural_cmp_handles_embedded_digit_runs() {
        assert_eq!(natural_cmp("alpha2", "alpha10"), Ordering::Less);
        assert_eq!(natural_cmp("beta", "beta.1"), Ordering::Less);
        assert_eq!(natural_cmp("rc9x", "rc10"), Ordering::Less);
        assert_eq!(natural_cmp("same", "same"), Ordering::Equal);
    }
}
