//! Region catalog.
//!
//! The source implementation asks `boto3.session.Session().get_available_regions(service)`,
//! backed by the SDK's bundled `endpoints.json`. No Rust AWS SDK crate exposes
//! an equivalent live enumeration API, so this is a static table covering the
//! services the crawler and its demo payloads actually target. `"GLOBAL"` is
//! kept as a sentinel that resolves to [`crate::config::DEFAULT_GLOBAL_REGION`]
//! for services (IAM, Organizations itself) that have no regional endpoints.

use crate::config::DEFAULT_GLOBAL_REGION;
use crate::error::{OrgError, OrgResult};

const ALL_COMMERCIAL_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "ca-central-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-south-1",
    "sa-east-1",
];

/// One entry per service the catalog knows about. `"GLOBAL"` marks
/// services with no regional endpoints (IAM), in which case
/// [`regions_for_service`] returns a single-element vec naming
/// [`DEFAULT_GLOBAL_REGION`].
const SERVICE_TABLE: &[(&str, &[&str])] = &[
    ("ec2", ALL_COMMERCIAL_REGIONS),
    ("s3", ALL_COMMERCIAL_REGIONS),
    ("config", ALL_COMMERCIAL_REGIONS),
    ("cloudtrail", ALL_COMMERCIAL_REGIONS),
    ("organizations", &["us-east-1"]),
    ("iam", &["GLOBAL"]),
    ("sts", &["GLOBAL"]),
];

/// Regions offered by `service`, expanding the `"GLOBAL"` sentinel.
/// Returns [`OrgError::InvalidService`] for an unrecognized service name.
pub fn regions_for_service(service: &str) -> OrgResult<Vec<String>> {
    let entry = SERVICE_TABLE
        .iter()
        .find(|(name, _)| *name == service)
        .ok_or_else(|| OrgError::InvalidService(service.to_string()))?;

    Ok(entry
        .1
        .iter()
        .map(|r| {
            if *r == "GLOBAL" {
                DEFAULT_GLOBAL_REGION.to_string()
            } else {
                r.to_string()
            }
        })
        .collect())
}

/// Equivalent to `regions_for_service("ec2")`: the broadest region list the
/// catalog knows about.
pub fn all_regions() -> Vec<String> {
    regions_for_service("ec2").expect("\"ec2\" is always registered in SERVICE_TABLE")
}

/// True if `region` is a concrete region the catalog recognizes. The
/// `"GLOBAL"` literal is not itself a region — see [`validate_regions`],
/// which expands it before this check ever runs.
pub fn is_known_region(region: &str) -> bool {
    ALL_COMMERCIAL_REGIONS.contains(&region)
}

/// Eagerly validate and resolve a caller-supplied region selection, per
/// spec.md §4.D/§4.G: empty/absent selects every region in the general
/// compute service's list, the literal `"GLOBAL"` (and only that literal,
/// alone) resolves to the single canonical [`DEFAULT_GLOBAL_REGION`], and
/// anything else must name regions the catalog actually knows about, or
/// this returns [`OrgError::InvalidRegion`] before any API call is made.
pub fn validate_regions(regions: Vec<String>) -> OrgResult<Vec<String>> {
    if regions.is_empty() {
        return Ok(all_regions());
    }
    if regions.len() == 1 && regions[0] == "GLOBAL" {
        return Ok(vec![DEFAULT_GLOBAL_REGION.to_string()]);
    }
    let unknown: Vec<&str> = regions
        .iter()
        .map(String::as_str)
        .filter(|r| !is_known_region(r))
        .collect();
    if !unknown.is_empty() {
        return Err(OrgError::InvalidRegion(unknown.join(", ")));
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_only_service_resolves_to_default_region() {
        let regions = regions_for_service("iam").unwrap();
        assert_eq!(regions, vec![DEFAULT_GLOBAL_REGION.to_string()]);
    }

    #[test]
    fn unknown_service_is_an_error() {
        assert!(matches!(
            regions_for_service("not-a-service"),
            Err(OrgError::InvalidService(_))
        ));
    }

    #[test]
    fn all_regions_matches_ec2_service_list() {
        assert_eq!(all_regions(), regions_for_service("ec2").unwrap());
    }

    #[test]
    fn all_regions_has_no_duplicates() {
        let regions = all_regions();
        let mut deduped = regions.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(regions.len(), deduped.len());
    }

    #[test]
    fn validate_regions_expands_empty_to_all_regions() {
        assert_eq!(validate_regions(vec![]).unwrap(), all_regions());
    }

    #[test]
    fn validate_regions_expands_global_literal() {
        assert_eq!(
            validate_regions(vec!["GLOBAL".to_string()]).unwrap(),
            vec![DEFAULT_GLOBAL_REGION.to_string()]
        );
    }

    #[test]
    fn validate_regions_passes_through_known_regions() {
        let regions = vec!["us-east-1".to_string(), "eu-west-1".to_string()];
        assert_eq!(validate_regions(regions.clone()).unwrap(), regions);
    }

    #[test]
    fn validate_regions_rejects_unknown_region() {
        let err = validate_regions(vec!["bogus".to_string()]).unwrap_err();
        assert!(matches!(err, OrgError::InvalidRegion(_)));
    }

    #[test]
    fn validate_regions_rejects_global_mixed_with_other_regions() {
        let err = validate_regions(vec!["GLOBAL".to_string(), "us-east-1".to_string()]).unwrap_err();
        assert!(matches!(err, OrgError::InvalidRegion(_)));
    }
}
