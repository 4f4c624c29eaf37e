//! Requirement-spec parsing and dpkg/rpm-style version comparison.
//!
//! A requirement spec is the `name[ op version]` grammar used everywhere a
//! caller names a package: `vim`, `libc>=2.30`, `coreutils = 9.1-2`. Parsing
//! never fails — malformed input simply becomes a name-only spec, per the
//! planner's contract that a bad requirement surfaces later as
//! `PackageNotFound`, not as a parse error.
//!
//! Version comparison follows the dpkg/rpm convention rather than semver:
//! an `epoch:upstream-revision` split, then an alternating run comparison
//! of upstream and revision where `~` sorts before everything (including
//! the empty string), digits compare numerically, and other characters
//! compare by byte value.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A comparison operator in a requirement spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Op {
    /// The operator tokens, longest first so a greedy left-to-right scan
    /// never mistakes `<=` for a bare `<`.
    const TOKENS: &'static [(&'static str, Op)] = &[
        ("<=", Op::Le),
        (">=", Op::Ge),
        ("!=", Op::Ne),
        ("=", Op::Eq),
        ("<", Op::Lt),
        (">", Op::Gt),
    ];

    fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }

    fn matches(self, ord: Ordering) -> bool {
        match self {
            Op::Eq => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `name [op version]`. Either both `op` and `version` are present or
/// neither — there is no way to construct a spec with one but not the
/// other outside of this module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RequirementSpec {
    name: String,
    op: Option<Op>,
    version: Option<String>,
}

impl RequirementSpec {
    /// A name-only spec matching any version of `name`.
    #[must_use]
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: None,
            version: None,
        }
    }

    /// A spec requiring exactly `version`.
    #[must_use]
    pub fn exact(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: Some(Op::Eq),
            version: Some(version.into()),
        }
    }

    /// Package name this spec names.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The comparison operator, if any.
    #[must_use]
    pub const fn op(&self) -> Option<Op> {
        self.op
    }

    /// The version operand, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Does `candidate` satisfy this requirement? A name-only spec is
    /// satisfied by any version of a matching name.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        match (self.op, &self.version) {
            (Some(op), Some(version)) => compare(candidate, op, version),
            _ => true,
        }
    }
}

impl fmt::Display for RequirementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.op, &self.version) {
            (Some(op), Some(version)) => write!(f, "{}{op}{version}", self.name),
            _ => f.write_str(&self.name),
        }
    }
}

impl FromStr for RequirementSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        for (token, op) in Op::TOKENS {
            if let Some(idx) = s.find(token) {
                let name = s[..idx].trim();
                let version = s[idx + token.len()..].trim();
                if !name.is_empty() && !version.is_empty() {
                    return Ok(Self {
                        name: name.to_string(),
                        op: Some(*op),
                        version: Some(version.to_string()),
                    });
                }
            }
        }
        Ok(Self::any(s))
    }
}

impl From<String> for RequirementSpec {
    fn from(s: String) -> Self {
        s.parse()
            .unwrap_or_else(|_: std::convert::Infallible| unreachable!())
    }
}

impl From<RequirementSpec> for String {
    fn from(spec: RequirementSpec) -> Self {
        spec.to_string()
    }
}

/// Does `v1 op v2` hold, under dpkg/rpm-style version ordering?
#[must_use]
pub fn compare(v1: &str, op: Op, v2: &str) -> bool {
    op.matches(compare_versions(v1, v2))
}

/// Compares two version strings using the dpkg/rpm convention:
/// `epoch:upstream-revision`, epoch compared numerically, upstream and
/// revision each compared by [`verrevcmp`].
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (ea, ua, ra) = split_version(a);
    let (eb, ub, rb) = split_version(b);
    ea.cmp(&eb)
        .then_with(|| verrevcmp(ua, ub))
        .then_with(|| verrevcmp(ra, rb))
}

fn split_version(v: &str) -> (u64, &str, &str) {
    let (epoch_str, rest) = v.split_once(':').unwrap_or(("0", v));
    let epoch = epoch_str.parse().unwrap_or(0);
    let (upstream, revision) = rest
        .rfind('-')
        .map_or((rest, ""), |idx| (&rest[..idx], &rest[idx + 1..]));
    (epoch, upstream, revision)
}

/// The per-byte ordering value dpkg's `verrevcmp` uses outside of numeric
/// runs: `~` sorts lowest, end-of-string and digits tie in the middle,
/// letters next, everything else highest.
fn order(b: Option<u8>) -> i32 {
    match b {
        None => 0,
        Some(b'~') => -1,
        Some(b) if b.is_ascii_digit() => 0,
        Some(b) if b.is_ascii_alphabetic() => i32::from(b),
        Some(b) => i32::from(b) + 256,
    }
}

/// Compares two version fragments (upstream or revision) the way dpkg's
/// `verrevcmp` does: alternating non-digit runs (compared byte-by-byte via
/// [`order`]) and digit runs (compared numerically, after skipping leading
/// zeros).
fn verrevcmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut ai, mut bi) = (0usize, 0usize);

    loop {
        while (ai < a.len() && !a[ai].is_ascii_digit()) || (bi < b.len() && !b[bi].is_ascii_digit())
        {
            let oa = order(a.get(ai).copied());
            let ob = order(b.get(bi).copied());
            if oa != ob {
                return oa.cmp(&ob);
            }
            if ai < a.len() {
                ai += 1;
            }
            if bi < b.len() {
                bi += 1;
            }
        }

        while a.get(ai) == Some(&b'0') {
            ai += 1;
        }
        while b.get(bi) == Some(&b'0') {
            bi += 1;
        }

        let a_start = ai;
        let b_start = bi;
        while a.get(ai).is_some_and(u8::is_ascii_digit) {
            ai += 1;
        }
        while b.get(bi).is_some_and(u8::is_ascii_digit) {
            bi += 1;
        }

        let a_len = ai - a_start;
        let b_len = bi - b_start;
        if a_len != b_len {
            return a_len.cmp(&b_len);
        }
        match a[a_start..ai].cmp(&b[b_start..bi]) {
            Ordering::Equal => {}
            other => return other,
        }

        if ai >= a.len() && bi >= b.len() {
            return Ordering::Equal;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn name_only() {
        let spec: RequirementSpec = "coreutils".parse().unwrap();
        assert_eq!(spec.name(), "coreutils");
        assert_eq!(spec.op(), None);
        assert_eq!(spec.version(), None);
    }

    #[test]
    fn name_with_ge() {
        let spec: RequirementSpec = "libc>=2.30".parse().unwrap();
        assert_eq!(spec.name(), "libc");
        assert_eq!(spec.op(), Some(Op::Ge));
        assert_eq!(spec.version(), Some("2.30"));
    }

    #[test]
    fn whitespace_around_operator_is_trimmed() {
        let spec: RequirementSpec = "coreutils = 9.1-2".parse().unwrap();
        assert_eq!(spec.name(), "coreutils");
        assert_eq!(spec.op(), Some(Op::Eq));
        assert_eq!(spec.version(), Some("9.1-2"));
    }

    #[test]
    fn longest_operator_wins() {
        for (raw, expected) in [
            ("pkg<=1", Op::Le),
            ("pkg>=1", Op::Ge),
            ("pkg!=1", Op::Ne),
            ("pkg=1", Op::Eq),
            ("pkg<1", Op::Lt),
            ("pkg>1", Op::Gt),
        ] {
            let spec: RequirementSpec = raw.parse().unwrap();
            assert_eq!(spec.op(), Some(expected), "parsing {raw}");
        }
    }

    #[test]
    fn malformed_input_becomes_name_only() {
        for raw in ["=1.0", "pkg=", "", "   ", ">="] {
            let spec: RequirementSpec = raw.parse().unwrap();
            assert_eq!(spec.op(), None, "parsing {raw:?} should yield name-only");
        }
    }

    #[test]
    fn display_round_trips() {
        let spec: RequirementSpec = "libc>=2.30".parse().unwrap();
        assert_eq!(spec.to_string(), "libc>=2.30");
        let spec: RequirementSpec = "coreutils".parse().unwrap();
        assert_eq!(spec.to_string(), "coreutils");
    }

    #[test]
    fn serde_round_trip() {
        let spec: RequirementSpec = "libc>=2.30".parse().unwrap();
        let json = sonic_rs::to_string(&spec).unwrap();
        let back: RequirementSpec = sonic_rs::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }

    #[test_case("1.0", "1.0", Ordering::Equal; "equal")]
    #[test_case("1.0", "1.1", Ordering::Less; "patch less")]
    #[test_case("2.0", "1.9", Ordering::Greater; "major greater")]
    #[test_case("1.0~rc1", "1.0", Ordering::Less; "tilde sorts before release")]
    #[test_case("1.0~rc1", "1.0~rc2", Ordering::Less; "tilde pre-release ordering")]
    #[test_case("1:1.0", "2.0", Ordering::Greater; "epoch dominates")]
    #[test_case("1.0-1", "1.0-2", Ordering::Less; "revision breaks tie")]
    #[test_case("1.0.10", "1.0.9", Ordering::Greater; "numeric run not lexical")]
    #[test_case("1.0", "1.0.0", Ordering::Less; "shorter numeric run is less")]
    #[test_case("", "", Ordering::Equal; "both empty")]
    fn version_ordering_table(a: &str, b: &str, expected: Ordering) {
        assert_eq!(compare_versions(a, b), expected, "comparing {a} and {b}");
    }

    #[test]
    fn compare_uses_requested_operator() {
        assert!(compare("2.31", Op::Ge, "2.30"));
        assert!(!compare("2.29", Op::Ge, "2.30"));
        assert!(compare("2.30", Op::Eq, "2.30"));
        assert!(compare("2.30", Op::Ne, "2.31"));
    }

    #[test]
    fn requirement_spec_matches() {
        let any = RequirementSpec::any("vim");
        assert!(any.matches("8.2.0"));

        let pinned: RequirementSpec = "libc>=2.30".parse().unwrap();
        assert!(pinned.matches("2.31"));
        assert!(!pinned.matches("2.29"));
    }

    proptest::proptest! {
        #[test]
        fn parsing_never_panics(s in ".*") {
            let _: RequirementSpec = s.parse().unwrap();
        }

        #[test]
        fn compare_versions_never_panics(a in ".*", b in ".*") {
            let _ = compare_versions(&a, &b);
        }

        #[test]
        fn compare_versions_is_reflexive(v in "[a-zA-Z0-9.:~-]{0,32}") {
            assert_eq!(compare_versions(&v, &v), Ordering::Equal);
        }

        #[test]
        fn display_from_str_round_trips(name in "[a-zA-Z][a-zA-Z0-9_-]{0,16}", version in "[0-9]{1,3}\\.[0-9]{1,3}") {
            let spec = RequirementSpec::exact(name, version);
            let again: RequirementSpec = spec.to_string().parse().unwrap();
            assert_eq!(spec, again);
        }
    }
}
