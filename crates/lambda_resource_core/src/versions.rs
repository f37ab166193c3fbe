//! Version selection for `check`.

use crate::contract::{ResourceVersion, ValidationError, VERSION_KEY};

/// The unpublished, mutable pseudo-version every function has.
pub const LATEST_VERSION: &str = "$LATEST";

/// A version as reported by the function-management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVersion {
    pub version: String,
    pub code_sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedVersion {
    pub number: u64,
    pub code_sha256: Option<String>,
}

pub fn parse_version_number(raw: &str) -> Result<u64, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::new("empty version string"));
    }
    raw.parse::<u64>()
        .map_err(|_| ValidationError::new(format!("{raw:?} is not a valid version integer")))
}

/// The baseline number, if the pipeline supplied one with a `version` key.
pub fn baseline_number(
    baseline: Option<&ResourceVersion>,
) -> Result<Option<u64>, ValidationError> {
    baseline
        .and_then(|version| version.get(VERSION_KEY))
        .map(|raw| parse_version_number(raw))
        .transpose()
}

/// Versions newer than `baseline`, oldest first.
///
/// Without a baseline only the newest version is returned, so a fresh
/// pipeline starts from the current version instead of the full history.
pub fn select_new_versions(
    published: impl IntoIterator<Item = PublishedVersion>,
    baseline: Option<u64>,
) -> Result<Vec<NumberedVersion>, ValidationError> {
    let mut selected = Vec::new();
    for candidate in published {
        if candidate.version == LATEST_VERSION {
            continue;
        }

        let number = parse_version_number(&candidate.version)?;
        if baseline.is_some_and(|baseline| number <= baseline) {
            continue;
        }

        selected.push(NumberedVersion {
            number,
            code_sha256: candidate.code_sha256,
        });
    }

    selected.sort_by_key(|version| version.number);
    selected.dedup_by_key(|version| version.number);

    if baseline.is_none() {
        let newest = selected.pop();
        selected = newest.into_iter().collect();
    }

    Ok(selected)
}

/// Whether an alias pointing at `current` is news relative to `baseline`.
pub fn alias_transition(
    current: NumberedVersion,
    baseline: Option<u64>,
) -> Option<NumberedVersion> {
    match baseline {
        Some(baseline) if baseline == current.number => None,
        _ => Some(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::version_record;

    fn published(versions: &[&str]) -> Vec<PublishedVersion> {
        versions
            .iter()
            .map(|version| PublishedVersion {
                version: version.to_string(),
                code_sha256: Some(format!("sha-{version}")),
            })
            .collect()
    }

    fn numbers(versions: &[NumberedVersion]) -> Vec<u64> {
        versions.iter().map(|version| version.number).collect()
    }

    #[test]
    fn returns_versions_after_baseline_in_ascending_order() {
        let selected =
            select_new_versions(published(&["$LATEST", "7", "3", "5", "6"]), Some(4)).expect("ok");
        assert_eq!(numbers(&selected), vec![5, 6, 7]);
        assert_eq!(selected[0].code_sha256.as_deref(), Some("sha-5"));
    }

    #[test]
    fn first_check_returns_only_newest_version() {
        let selected =
            select_new_versions(published(&["1", "12", "$LATEST", "2"]), None).expect("ok");
        assert_eq!(numbers(&selected), vec![12]);
    }

    #[test]
    fn first_check_without_versions_is_empty() {
        let selected = select_new_versions(published(&["$LATEST"]), None).expect("ok");
        assert!(selected.is_empty());
    }

    #[test]
    fn baseline_at_newest_yields_nothing() {
        let selected = select_new_versions(published(&["1", "2"]), Some(2)).expect("ok");
        assert!(selected.is_empty());
    }

    #[test]
    fn duplicates_are_collapsed() {
        let selected = select_new_versions(published(&["3", "3", "2"]), Some(1)).expect("ok");
        assert_eq!(numbers(&selected), vec![2, 3]);
    }

    #[test]
    fn non_numeric_published_version_is_fatal() {
        let error = select_new_versions(published(&["1", "beta"]), None)
            .expect_err("non-numeric version should fail");
        assert!(error.message().contains("beta"));
    }

    #[test]
    fn numeric_order_beats_lexical_order() {
        let selected = select_new_versions(published(&["9", "10", "11"]), Some(8)).expect("ok");
        assert_eq!(numbers(&selected), vec![9, 10, 11]);
    }

    #[test]
    fn baseline_parsing() {
        assert_eq!(baseline_number(None).expect("ok"), None);
        assert_eq!(
            baseline_number(Some(&ResourceVersion::new())).expect("ok"),
            None
        );
        assert_eq!(
            baseline_number(Some(&version_record(42, Some("PROD")))).expect("ok"),
            Some(42)
        );

        let bad = ResourceVersion::from([("version".to_string(), "x".to_string())]);
        assert!(baseline_number(Some(&bad)).is_err());
    }

    #[test]
    fn rejects_empty_and_negative_versions() {
        assert_eq!(
            parse_version_number("").expect_err("empty").message(),
            "empty version string"
        );
        assert!(parse_version_number("-1").is_err());
        assert!(parse_version_number("abc").is_err());
        assert_eq!(parse_version_number("42").expect("numeric"), 42);
    }

    #[test]
    fn alias_transition_only_on_change() {
        let current = NumberedVersion {
            number: 4,
            code_sha256: None,
        };
        assert_eq!(alias_transition(current.clone(), Some(4)), None);
        assert_eq!(alias_transition(current.clone(), Some(3)), Some(current.clone()));
        assert_eq!(alias_transition(current.clone(), None), Some(current));
    }
}
