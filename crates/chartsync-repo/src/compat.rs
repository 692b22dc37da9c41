//! Platform version compatibility checks
//!
//! Chart versions declare the platform versions they support with
//! Helm-style range expressions (`>=1.20.0 <1.26.0`, `1.20 - 1.24`,
//! `<1.19 || >=1.25`). Single comparators are parsed by `semver`; the
//! extra syntax (`||`, hyphen ranges, whitespace as AND, `!=`, a leading
//! `v`) and the matching rules are handled here.

use semver::{BuildMetadata, Comparator, Op, Version, VersionReq};

use crate::index::parse_version_lenient;

/// Check whether `version` satisfies the range expression `constraint`
///
/// An empty constraint or an empty version always passes. Anything that
/// cannot be parsed fails; this never errors.
///
/// A pre-release `version` only satisfies comparators that name a
/// pre-release themselves. Such comparators use full semver precedence.
pub fn is_compatible_range(constraint: &str, version: &str) -> bool {
    let constraint = constraint.trim();
    let version = version.trim();
    if constraint.is_empty() || version.is_empty() {
        return true;
    }

    let Some(mut version) = parse_version_lenient(version) else {
        tracing::debug!(version, "Unparsable platform version, treating as incompatible");
        return false;
    };
    version.build = BuildMetadata::EMPTY;

    match Constraint::parse(constraint) {
        Some(parsed) => parsed.matches(&version),
        None => {
            tracing::debug!(constraint, "Unparsable version constraint, treating as incompatible");
            false
        }
    }
}

/// Alternatives joined by `||`
#[derive(Debug)]
struct Constraint {
    alternatives: Vec<Conjunction>,
}

/// Comparators that must all hold
#[derive(Debug)]
struct Conjunction {
    required: Vec<Comparator>,
    /// `!=` terms; partial versions exclude the whole range they cover
    excluded: Vec<Comparator>,
}

impl Constraint {
    fn parse(input: &str) -> Option<Self> {
        let alternatives = input
            .split("||")
            .map(Conjunction::parse)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { alternatives })
    }

    fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|c| c.matches(version))
    }
}

impl Conjunction {
    fn parse(input: &str) -> Option<Self> {
        let tokens = tokenize(input);
        if tokens.is_empty() {
            return None;
        }

        let mut terms = Vec::new();
        let mut excluded = Vec::new();

        let mut i = 0;
        while i < tokens.len() {
            // Hyphen range: `a - b`
            if tokens.get(i + 1).map(String::as_str) == Some("-") {
                let low = strip_v(&tokens[i]);
                let high = strip_v(tokens.get(i + 2)?);
                terms.push(format!(">={}", low));
                terms.push(format!("<={}", high));
                i += 3;
                continue;
            }

            let (op, rest) = split_operator(&tokens[i]);
            let rest = strip_v(rest);
            if rest.is_empty() {
                return None;
            }

            match op {
                "!=" => excluded.push(rest.parse::<Comparator>().ok()?),
                "" if is_wildcard(rest) => terms.push(rest.to_string()),
                "" => terms.push(format!("={}", rest)),
                "~>" => terms.push(format!("~{}", rest)),
                _ => terms.push(format!("{}{}", op, rest)),
            }
            i += 1;
        }

        let mut required = Vec::new();
        for term in &terms {
            required.extend(VersionReq::parse(term).ok()?.comparators);
        }

        Some(Self { required, excluded })
    }

    fn matches(&self, version: &Version) -> bool {
        self.required.iter().all(|c| comparator_matches(c, version))
            && !self.excluded.iter().any(|c| excludes(c, version))
    }
}

/// A pre-release version is only considered by comparators naming one
fn admits_prerelease(cmp: &Comparator, version: &Version) -> bool {
    version.pre.is_empty() || !cmp.pre.is_empty()
}

fn comparator_matches(cmp: &Comparator, version: &Version) -> bool {
    if !admits_prerelease(cmp, version) {
        return false;
    }

    let floor = Version {
        major: cmp.major,
        minor: cmp.minor.unwrap_or(0),
        patch: cmp.patch.unwrap_or(0),
        pre: cmp.pre.clone(),
        build: BuildMetadata::EMPTY,
    };
    let v = version;

    match cmp.op {
        Op::Exact | Op::Wildcard => covers(cmp, v),
        Op::Greater => match (cmp.minor, cmp.patch) {
            (None, _) => v.major > cmp.major,
            (Some(minor), None) => (v.major, v.minor) > (cmp.major, minor),
            _ => *v > floor,
        },
        Op::GreaterEq => *v >= floor,
        Op::Less => *v < floor,
        Op::LessEq => match (cmp.minor, cmp.patch) {
            (None, _) => v.major <= cmp.major,
            (Some(minor), None) => (v.major, v.minor) <= (cmp.major, minor),
            _ => *v <= floor,
        },
        Op::Tilde => {
            *v >= floor
                && v.major == cmp.major
                && cmp.minor.is_none_or(|minor| v.minor == minor)
        }
        Op::Caret => {
            *v >= floor
                && v.major == cmp.major
                && match (cmp.major, cmp.minor, cmp.patch) {
                    (0, Some(0), Some(patch)) => v.minor == 0 && v.patch == patch,
                    (0, Some(minor), _) => v.minor == minor,
                    _ => true,
                }
        }
        _ => false,
    }
}

/// Versions an exact or partial version stands for
///
/// `1.22` covers every `1.22.x`, a full version only itself.
fn covers(cmp: &Comparator, v: &Version) -> bool {
    v.major == cmp.major
        && cmp.minor.is_none_or(|minor| v.minor == minor)
        && match cmp.patch {
            Some(patch) => v.patch == patch && v.pre == cmp.pre,
            None => true,
        }
}

fn excludes(cmp: &Comparator, version: &Version) -> bool {
    let partial = cmp.patch.is_none();
    if partial && !admits_prerelease(cmp, version) {
        // A partial `!=` does not cover pre-releases, and neither do they pass it
        return true;
    }
    covers(cmp, version)
}

const OPERATORS: &[&str] = &["~>", ">=", "<=", "!=", ">", "<", "=", "~", "^"];

/// Split on commas and whitespace, re-attaching detached operators
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<String> = None;

    for raw in input.split(|c: char| c == ',' || c.is_whitespace()) {
        if raw.is_empty() {
            continue;
        }
        if OPERATORS.contains(&raw) {
            pending_op = Some(pending_op.unwrap_or_default() + raw);
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(op + raw),
            None => tokens.push(raw.to_string()),
        }
    }

    // A dangling operator is kept so parsing rejects it
    if let Some(op) = pending_op {
        tokens.push(op);
    }
    tokens
}

fn split_operator(token: &str) -> (&str, &str) {
    OPERATORS
        .iter()
        .find_map(|op| token.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("", token))
}

fn strip_v(s: &str) -> &str {
    s.strip_prefix('v').unwrap_or(s)
}

fn is_wildcard(s: &str) -> bool {
    s.split('.').any(|part| matches!(part, "x" | "X" | "*"))
}
