//! Resource name codec.
//!
//! Bytebase names are slash-separated `{collection}/{id}` pairs, e.g.
//! `projects/acme/databaseGroups/prod`. Names are opaque everywhere else in
//! the crate; this module is the only place that splits or joins them.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ProviderError;

/// Name of the workspace singleton.
pub const WORKSPACE_NAME: &str = "workspaces/-";

/// Collection prefixes.
pub const WORKSPACE_PREFIX: &str = "workspaces";
/// Environment prefix.
pub const ENVIRONMENT_PREFIX: &str = "environments";
/// Project prefix.
pub const PROJECT_PREFIX: &str = "projects";
/// Database group prefix, nested under projects.
pub const DATABASE_GROUP_PREFIX: &str = "databaseGroups";
/// VCS connector prefix, nested under projects.
pub const VCS_CONNECTOR_PREFIX: &str = "vcsConnectors";
/// Instance prefix.
pub const INSTANCE_PREFIX: &str = "instances";
/// Database prefix, nested under instances.
pub const DATABASE_PREFIX: &str = "databases";
/// VCS provider prefix.
pub const VCS_PROVIDER_PREFIX: &str = "vcsProviders";
/// Policy prefix, appended to any parent.
pub const POLICY_PREFIX: &str = "policies";
/// Setting prefix.
pub const SETTING_PREFIX: &str = "settings";
/// Role prefix.
pub const ROLE_PREFIX: &str = "roles";
/// User prefix.
pub const USER_PREFIX: &str = "users";
/// Group prefix.
pub const GROUP_PREFIX: &str = "groups";
/// Risk prefix.
pub const RISK_PREFIX: &str = "risks";
/// Review config prefix.
pub const REVIEW_CONFIG_PREFIX: &str = "reviewConfigs";
/// Suffix of a database catalog name.
pub const CATALOG_SUFFIX: &str = "catalog";

/// Pattern every resource id must match.
pub const RESOURCE_ID_PATTERN: &str = "^[a-z]([a-z0-9-]{0,61}[a-z0-9])?$";

fn resource_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(RESOURCE_ID_PATTERN).expect("resource id pattern is valid"))
}

/// Split `name` into the ids following each expected prefix.
///
/// The name must have exactly `2 * prefixes.len()` segments, each
/// even-indexed segment equal to the corresponding prefix, and no empty id.
///
/// ```
/// use terraform_provider_bytebase::names::parse;
///
/// let ids = parse("projects/acme/databaseGroups/prod", &["projects", "databaseGroups"]).unwrap();
/// assert_eq!(ids, vec!["acme", "prod"]);
/// ```
pub fn parse<'a>(name: &'a str, prefixes: &[&str]) -> Result<Vec<&'a str>, ProviderError> {
    let segments: Vec<&str> = name.split('/').collect();
    if segments.len() != 2 * prefixes.len() {
        return Err(ProviderError::invalid(format!(
            "invalid resource name {:?}: expected format {}",
            name,
            expected_format(prefixes)
        )));
    }
    let mut ids = Vec::with_capacity(prefixes.len());
    for (i, prefix) in prefixes.iter().enumerate() {
        if segments[2 * i] != *prefix {
            return Err(ProviderError::invalid(format!(
                "invalid resource name {:?}: segment {} should be {:?}",
                name,
                2 * i,
                prefix
            )));
        }
        let id = segments[2 * i + 1];
        if id.is_empty() {
            return Err(ProviderError::invalid(format!(
                "invalid resource name {:?}: empty id after {:?}",
                name, prefix
            )));
        }
        ids.push(id);
    }
    Ok(ids)
}

/// Parse a single-level name and return its id.
pub fn parse_one<'a>(name: &'a str, prefix: &str) -> Result<&'a str, ProviderError> {
    Ok(parse(name, &[prefix])?[0])
}

/// Join `(prefix, id)` pairs into a name.
///
/// ```
/// use terraform_provider_bytebase::names::format;
///
/// assert_eq!(format(&[("instances", "prod"), ("databases", "hr")]), "instances/prod/databases/hr");
/// ```
pub fn format(parts: &[(&str, &str)]) -> String {
    parts
        .iter()
        .map(|(prefix, id)| format!("{}/{}", prefix, id))
        .collect::<Vec<_>>()
        .join("/")
}

/// Format a single-level name.
pub fn format_one(prefix: &str, id: &str) -> String {
    format(&[(prefix, id)])
}

fn expected_format(prefixes: &[&str]) -> String {
    prefixes
        .iter()
        .map(|p| format!("{}/{{id}}", p))
        .collect::<Vec<_>>()
        .join("/")
}

/// Check a resource id against [`RESOURCE_ID_PATTERN`].
pub fn validate_resource_id(id: &str) -> Result<(), ProviderError> {
    if resource_id_regex().is_match(id) {
        Ok(())
    } else {
        Err(ProviderError::invalid(format!(
            "invalid resource id {:?}: must match {}",
            id, RESOURCE_ID_PATTERN
        )))
    }
}

/// Accept `name` if any of the patterns matches it.
///
/// Invalid patterns are reported as errors rather than skipped.
pub fn validate_name_patterns(name: &str, patterns: &[String]) -> Result<(), ProviderError> {
    for pattern in patterns {
        let re = Regex::new(pattern)
            .map_err(|e| ProviderError::invalid(format!("invalid pattern {:?}: {}", pattern, e)))?;
        if re.is_match(name) {
            return Ok(());
        }
    }
    Err(ProviderError::invalid(format!(
        "resource name {:?} does not match any of {:?}",
        name, patterns
    )))
}

/// Split `{parent}/policies/{type}` into parent and type segment.
/// Workspace policies have no parent: `policies/{type}`.
pub fn split_policy_name(name: &str) -> Result<(&str, &str), ProviderError> {
    if let Some(policy) = name
        .strip_prefix(POLICY_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        if policy.is_empty() || policy.contains('/') {
            return Err(ProviderError::invalid(format!("invalid policy name {:?}", name)));
        }
        return Ok(("", policy));
    }
    let marker = format!("/{}/", POLICY_PREFIX);
    match name.rfind(&marker) {
        Some(idx) => {
            let parent = &name[..idx];
            let policy = &name[idx + marker.len()..];
            if parent.is_empty() || policy.is_empty() || policy.contains('/') {
                Err(ProviderError::invalid(format!("invalid policy name {:?}", name)))
            } else {
                Ok((parent, policy))
            }
        },
        None => Err(ProviderError::invalid(format!(
            "invalid policy name {:?}: expected {{parent}}/{}/{{type}}",
            name, POLICY_PREFIX
        ))),
    }
}

/// Name of the catalog of a database.
pub fn catalog_name(database: &str) -> String {
    format!("{}/{}", database, CATALOG_SUFFIX)
}

/// Database name owning a catalog name.
pub fn database_of_catalog(catalog: &str) -> Result<&str, ProviderError> {
    let database = catalog
        .strip_suffix(&format!("/{}", CATALOG_SUFFIX))
        .ok_or_else(|| ProviderError::invalid(format!("invalid catalog name {:?}", catalog)))?;
    parse(database, &[INSTANCE_PREFIX, DATABASE_PREFIX])?;
    Ok(database)
}

/// Whether `name` refers to something a tag policy can be attached to.
pub fn is_review_target(name: &str) -> bool {
    parse(name, &[ENVIRONMENT_PREFIX]).is_ok() || parse(name, &[PROJECT_PREFIX]).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_levels() {
        let ids = parse("instances/prod/databases/hr", &[INSTANCE_PREFIX, DATABASE_PREFIX]).unwrap();
        assert_eq!(ids, vec!["prod", "hr"]);
    }

    #[test]
    fn test_parse_rejects_wrong_prefix() {
        let err = parse("projects/acme", &[INSTANCE_PREFIX]).unwrap_err();
        assert!(err.message().contains("instances"));
    }

    #[test]
    fn test_parse_rejects_segment_count() {
        assert!(parse("projects/acme/extra", &[PROJECT_PREFIX]).is_err());
        assert!(parse("projects", &[PROJECT_PREFIX]).is_err());
        assert!(parse("", &[PROJECT_PREFIX]).is_err());
    }

    #[test]
    fn test_parse_rejects_empty_id() {
        assert!(parse("projects/", &[PROJECT_PREFIX]).is_err());
        assert!(parse("projects//databaseGroups/g", &[PROJECT_PREFIX, DATABASE_GROUP_PREFIX]).is_err());
    }

    #[test]
    fn test_format_round_trip() {
        let name = format(&[(PROJECT_PREFIX, "acme"), (VCS_CONNECTOR_PREFIX, "main")]);
        assert_eq!(name, "projects/acme/vcsConnectors/main");
        assert_eq!(
            parse(&name, &[PROJECT_PREFIX, VCS_CONNECTOR_PREFIX]).unwrap(),
            vec!["acme", "main"]
        );
    }

    #[test]
    fn test_workspace_name() {
        assert_eq!(parse_one(WORKSPACE_NAME, WORKSPACE_PREFIX).unwrap(), "-");
    }

    #[test]
    fn test_validate_resource_id() {
        assert!(validate_resource_id("a").is_ok());
        assert!(validate_resource_id("acme-prod-1").is_ok());
        assert!(validate_resource_id(&format!("a{}", "b".repeat(62))).is_ok());

        assert!(validate_resource_id("").is_err());
        assert!(validate_resource_id("Acme").is_err());
        assert!(validate_resource_id("1acme").is_err());
        assert!(validate_resource_id("acme-").is_err());
        assert!(validate_resource_id("acme_prod").is_err());
        assert!(validate_resource_id(&format!("a{}", "b".repeat(63))).is_err());
    }

    #[test]
    fn test_validate_name_patterns() {
        let patterns = vec![
            "^environments/[a-z-]+$".to_string(),
            "^projects/[a-z-]+$".to_string(),
        ];
        assert!(validate_name_patterns("projects/p1", &patterns).is_err());
        assert!(validate_name_patterns("projects/p", &patterns).is_ok());
        assert!(validate_name_patterns("instances/i", &patterns).is_err());
        assert!(validate_name_patterns("x", &["(".to_string()]).is_err());
    }

    #[test]
    fn test_split_policy_name() {
        let (parent, policy) = split_policy_name("projects/p/policies/tag").unwrap();
        assert_eq!(parent, "projects/p");
        assert_eq!(policy, "tag");

        let (parent, _) =
            split_policy_name("instances/i/databases/d/policies/masking_exception").unwrap();
        assert_eq!(parent, "instances/i/databases/d");

        assert_eq!(split_policy_name("policies/masking_rule").unwrap(), ("", "masking_rule"));
        assert!(split_policy_name("policies/").is_err());
        assert!(split_policy_name("projects/p").is_err());
    }

    #[test]
    fn test_catalog_names() {
        let catalog = catalog_name("instances/i/databases/d");
        assert_eq!(catalog, "instances/i/databases/d/catalog");
        assert_eq!(database_of_catalog(&catalog).unwrap(), "instances/i/databases/d");
        assert!(database_of_catalog("instances/i/catalog").is_err());
    }

    #[test]
    fn test_is_review_target() {
        assert!(is_review_target("environments/test"));
        assert!(is_review_target("projects/p1"));
        assert!(!is_review_target("instances/i"));
    }
}
