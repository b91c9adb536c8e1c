use url::Url;

/// Extracts the registrable domain from a URL
///
/// The registrable domain is the lowercase host with any leading `www.`
/// stripped. It is the grouping key for output partitioning and crawl
/// fairness, recomputed from URLs rather than stored.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use trawl::url::registrable_domain;
///
/// let url = Url::parse("https://www.Example.COM/path").unwrap();
/// assert_eq!(registrable_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("https://blog.example.com/post").unwrap();
/// assert_eq!(registrable_domain(&url), Some("blog.example.com".to_string()));
/// ```
pub fn registrable_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let host = h.to_lowercase();
        match host.strip_prefix("www.") {
            Some(rest) if rest.contains('.') => rest.to_string(),
            _ => host,
        }
    })
}

/// Extracts the registrable domain from a URL string
///
/// Convenience wrapper for call sites that hold unparsed URLs.
pub fn domain_of(url_str: &str) -> Option<String> {
    Url::parse(url_str).ok().as_ref().and_then(registrable_domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(registrable_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_www_stripped() {
        let url = Url::parse("https://www.example.com/").unwrap();
        assert_eq!(registrable_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_subdomain_preserved() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(
            registrable_domain(&url),
            Some("blog.example.com".to_string())
        );
    }

    #[test]
    fn test_uppercase_lowered() {
        let url = Url::parse("https://WWW.EXAMPLE.COM/").unwrap();
        assert_eq!(registrable_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_port_ignored() {
        let url = Url::parse("http://example.com:8080/").unwrap();
        assert_eq!(registrable_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_ip_host() {
        let url = Url::parse("http://127.0.0.1:3000/page").unwrap();
        assert_eq!(registrable_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_domain_of_string() {
        assert_eq!(
            domain_of("https://www.example.com/a?b=c"),
            Some("example.com".to_string())
        );
        assert_eq!(domain_of("not a url"), None);
    }

    #[test]
    fn test_bare_www() {
        // "www." alone should not strip down to an empty host
        let url = Url::parse("https://www.com/").unwrap();
        assert_eq!(registrable_domain(&url), Some("www.com".to_string()));
    }
}
