use url::Url;

const SECURE_PREFIX: &str = "https://";
const WILDCARD_PREFIX: &str = "*.";

/// Host (with explicit port, if any) of a message origin.
///
/// Default ports are omitted by the URL parser, so
/// `https://teams.microsoft.com:443` yields `teams.microsoft.com`.
pub fn host_of(origin: &Url) -> Option<String> {
    let host = origin.host_str()?;
    Some(match origin.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Match a host against an exact or wildcard pattern.
///
/// Only a leading `*.` is a wildcard: it stands for exactly one label in
/// front of the rest of the pattern. Every other pattern, including one
/// with a `*` elsewhere, must equal the host.
///
/// ```
/// use hostbridge_origin::matches_host_pattern;
///
/// assert!(matches_host_pattern("*.teams.microsoft.com", "sub.teams.microsoft.com"));
/// assert!(!matches_host_pattern("*.teams.microsoft.com", "a.b.teams.microsoft.com"));
/// assert!(!matches_host_pattern("app.*.example.com", "app.evil.example.com"));
/// assert!(!matches_host_pattern("teams.microsoft.com", "team.microsoft.com"));
/// ```
pub fn matches_host_pattern(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    let Some(rest) = pattern.strip_prefix(WILDCARD_PREFIX) else {
        return pattern == host;
    };

    match host.strip_suffix(rest).and_then(|head| head.strip_suffix('.')) {
        Some(head) => !head.is_empty() && !head.contains('.'),
        None => false,
    }
}

/// Normalize a caller-supplied extra origin to a host pattern.
///
/// Accepts `host`, `*.host`, or either prefixed with `https://`. Entries
/// with any other scheme are rejected.
pub fn normalize_additional_origin(origin: &str) -> Option<String> {
    let trimmed = origin.trim().to_ascii_lowercase();
    let without_scheme = match trimmed.strip_prefix(SECURE_PREFIX) {
        Some(rest) => rest,
        None if trimmed.contains("://") => return None,
        None => trimmed.as_str(),
    };
    let host = without_scheme.trim_end_matches('/');
    if host.is_empty() || host.contains('/') {
        return None;
    }
    Some(host.to_string())
}

/// Whether an allow-list entry parses as a host.
pub(crate) fn is_parseable_host(entry: &str) -> bool {
    let candidate = match entry.strip_prefix("*.") {
        Some(rest) => format!("wildcard.{rest}"),
        None => entry.to_string(),
    };
    if candidate.contains('*') || candidate.contains('/') {
        return false;
    }
    match Url::parse(&format!("{SECURE_PREFIX}{candidate}")) {
        Ok(url) => url.host_str().is_some_and(|host| !host.is_empty()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(matches_host_pattern("teams.microsoft.com", "teams.microsoft.com"));
        assert!(matches_host_pattern("Teams.Microsoft.com", "teams.microsoft.COM"));
        assert!(!matches_host_pattern("teams.microsoft.com", "teams.microsoft.us"));
    }

    #[test]
    fn wildcard_matches_one_label() {
        assert!(matches_host_pattern("*.teams.microsoft.com", "sub.teams.microsoft.com"));
        assert!(!matches_host_pattern("*.teams.microsoft.com", "teams.microsoft.com"));
        assert!(!matches_host_pattern(
            "*.teams.microsoft.com",
            "evil.sub.teams.microsoft.com"
        ));
    }

    #[test]
    fn wildcard_rejects_suffix_attacks() {
        assert!(!matches_host_pattern(
            "*.teams.microsoft.com",
            "teams.microsoft.com.evil.com"
        ));
        assert!(!matches_host_pattern(
            "*.teams.microsoft.com",
            "evil.sub.teams.microsoft.com.other"
        ));
    }

    #[test]
    fn wildcard_never_in_tld_position() {
        assert!(!matches_host_pattern("teams.microsoft.*", "teams.microsoft.com"));
    }

    #[test]
    fn single_wildcard_only() {
        assert!(!matches_host_pattern("*.*.microsoft.com", "a.b.microsoft.com"));
    }

    #[test]
    fn inner_star_is_literal() {
        assert!(!matches_host_pattern("app.*.example.com", "app.evil.example.com"));
        assert!(!matches_host_pattern("app.*.example.com", "app.x.example.com"));
        assert!(!matches_host_pattern("*app.example.com", "evilapp.example.com"));
    }

    #[test]
    fn wildcard_needs_a_label_boundary() {
        assert!(!matches_host_pattern("*.example.com", "evilexample.com"));
        assert!(!matches_host_pattern("*.example.com", ".example.com"));
    }

    #[test]
    fn ports_are_part_of_the_host() {
        assert!(matches_host_pattern(
            "local.teams.live.com:8080",
            "local.teams.live.com:8080"
        ));
        assert!(!matches_host_pattern("local.teams.live.com", "local.teams.live.com:8080"));
    }

    #[test]
    fn host_of_includes_non_default_port() {
        let url = Url::parse("https://local.teams.live.com:8080").unwrap();
        assert_eq!(host_of(&url).unwrap(), "local.teams.live.com:8080");

        let url = Url::parse("https://teams.microsoft.com:443").unwrap();
        assert_eq!(host_of(&url).unwrap(), "teams.microsoft.com");
    }

    #[test]
    fn additional_origin_normalization() {
        assert_eq!(
            normalize_additional_origin("https://Contoso.com/").as_deref(),
            Some("contoso.com")
        );
        assert_eq!(
            normalize_additional_origin("*.contoso.com").as_deref(),
            Some("*.contoso.com")
        );
        assert_eq!(normalize_additional_origin("http://contoso.com"), None);
        assert_eq!(normalize_additional_origin("   "), None);
        assert_eq!(normalize_additional_origin("https://contoso.com/path"), None);
    }

    #[test]
    fn parseable_hosts() {
        assert!(is_parseable_host("teams.microsoft.com"));
        assert!(is_parseable_host("*.teams.microsoft.com"));
        assert!(is_parseable_host("local.teams.live.com:8080"));
        assert!(!is_parseable_host("bad host"));
        assert!(!is_parseable_host("a.*.b"));
        assert!(!is_parseable_host(""));
    }
}
