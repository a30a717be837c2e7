//! The blacklist oracle.
//!
//! The relay asks one boolean question per client, on the first chunk of its
//! first request: is this referer blacklisted? The question goes through the
//! [`Blacklist`] trait so deployments can plug in whatever answers it -
//! the shipped [`HostSuffixBlacklist`], or anything else. This code runs once
//! per client request, so implementations should stay fast; heavier oracles
//! may want to cache on some subset of the referer string.

use memchr::memchr2;
use memchr::memmem;

/// Answers whether a referer should have its request rewritten.
pub trait Blacklist: Send + Sync {
    /// Pure predicate over the raw referer bytes as they appeared on the
    /// wire. Called at most once per client.
    fn is_blacklisted(&self, referer: &[u8]) -> bool;
}

impl<F> Blacklist for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn is_blacklisted(&self, referer: &[u8]) -> bool {
        self(referer)
    }
}

/// A blacklist of referer hosts matched by domain suffix.
///
/// A pattern `evil.example` matches the referer hosts `evil.example` and
/// `cdn.evil.example`, but not `notevil.example`. Matching is
/// ASCII-case-insensitive. An empty list blacklists nothing.
#[derive(Debug, Default, Clone)]
pub struct HostSuffixBlacklist {
    patterns: Vec<Vec<u8>>,
}

impl HostSuffixBlacklist {
    /// Build from an iterator of host patterns. Empty entries are dropped.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().as_bytes().to_vec())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Parse the on-disk format: one host pattern per line, `#` starting a
    /// comment line, blank lines skipped.
    pub fn from_lines(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// Number of patterns held.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when no patterns are held.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Blacklist for HostSuffixBlacklist {
    fn is_blacklisted(&self, referer: &[u8]) -> bool {
        let host = referer_host(referer);
        if host.is_empty() {
            return false;
        }
        self.patterns.iter().any(|p| host_matches(host, p))
    }
}

/// Extract the host portion of a referer value: everything between the
/// scheme separator (if any) and the first `/` or `:` that follows it.
fn referer_host(referer: &[u8]) -> &[u8] {
    let rest = match memmem::find(referer, b"://") {
        Some(idx) => &referer[idx + 3..],
        None => referer,
    };
    match memchr2(b'/', b':', rest) {
        Some(end) => &rest[..end],
        None => rest,
    }
}

fn host_matches(host: &[u8], pattern: &[u8]) -> bool {
    if host.len() == pattern.len() {
        return host.eq_ignore_ascii_case(pattern);
    }
    if host.len() > pattern.len() {
        let boundary = host.len() - pattern.len();
        return host[boundary - 1] == b'.' && host[boundary..].eq_ignore_ascii_case(pattern);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referer_host_extraction() {
        assert_eq!(referer_host(b"http://evil.example/page"), b"evil.example");
        assert_eq!(referer_host(b"https://evil.example:8080/x"), b"evil.example");
        assert_eq!(referer_host(b"evil.example"), b"evil.example");
        assert_eq!(referer_host(b"evil.example/page"), b"evil.example");
        assert_eq!(referer_host(b""), b"");
    }

    #[test]
    fn test_suffix_matching() {
        let list = HostSuffixBlacklist::new(["evil.example"]);
        assert!(list.is_blacklisted(b"http://evil.example/"));
        assert!(list.is_blacklisted(b"http://cdn.evil.example/img"));
        assert!(list.is_blacklisted(b"HTTP://EVIL.EXAMPLE"));
        assert!(!list.is_blacklisted(b"http://notevil.example/"));
        assert!(!list.is_blacklisted(b"http://evil.example.org/"));
        assert!(!list.is_blacklisted(b"http://good.example/"));
    }

    #[test]
    fn test_empty_list_blacklists_nothing() {
        let list = HostSuffixBlacklist::default();
        assert!(list.is_empty());
        assert!(!list.is_blacklisted(b"http://anything.example/"));
    }

    #[test]
    fn test_from_lines() {
        let list = HostSuffixBlacklist::from_lines(
            "# hotlinkers\nevil.example\n\n  spaced.example  \n# end\n",
        );
        assert_eq!(list.len(), 2);
        assert!(list.is_blacklisted(b"http://evil.example/"));
        assert!(list.is_blacklisted(b"http://spaced.example/"));
    }

    #[test]
    fn test_closure_blacklist() {
        let odd_length = |referer: &[u8]| referer.len() % 2 == 1;
        assert!(odd_length.is_blacklisted(b"abc"));
        assert!(!odd_length.is_blacklisted(b"ab"));
    }
}
