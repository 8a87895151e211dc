use url::Url;

/// Returns true when `page_url` matches one of the user's blacklist entries.
///
/// An entry containing `://` matches as a URL prefix. Any other entry is a
/// host name (optionally written `*.example.com`) and matches that host and
/// its subdomains. Blank entries and unparsable page URLs never match.
pub fn is_blacklisted(page_url: &str, entries: &[String]) -> bool {
    let Ok(page) = Url::parse(page_url.trim()) else {
        return false;
    };
    let host = page.host_str().map(str::to_ascii_lowercase);

    entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .any(|entry| {
            if entry.contains("://") {
                match Url::parse(entry) {
                    Ok(prefix) => page.as_str().starts_with(prefix.as_str()),
                    Err(_) => page.as_str().starts_with(entry),
                }
            } else {
                let wanted = entry.trim_start_matches("*.").to_ascii_lowercase();
                host.as_deref().is_some_and(|host| {
                    host == wanted || host.ends_with(&format!(".{wanted}"))
                })
            }
        })
}

#[cfg(test)]
mod tests {
    use super::is_blacklisted;

    fn entries(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn host_entries_cover_subdomains_only() {
        let list = entries(&["example.com"]);
        assert!(is_blacklisted("https://example.com/a", &list));
        assert!(is_blacklisted("https://mail.EXAMPLE.com/", &list));
        assert!(!is_blacklisted("https://notexample.com/", &list));
    }

    #[test]
    fn wildcard_prefix_is_accepted() {
        assert!(is_blacklisted(
            "https://docs.example.org/page",
            &entries(&["*.example.org"])
        ));
    }

    #[test]
    fn url_entries_match_as_prefix() {
        let list = entries(&["https://example.com/private"]);
        assert!(is_blacklisted("https://example.com/private/notes", &list));
        assert!(!is_blacklisted("https://example.com/public", &list));
    }

    #[test]
    fn blank_entries_and_bad_urls_never_match() {
        assert!(!is_blacklisted("https://example.com", &entries(&["  "])));
        assert!(!is_blacklisted("not a url", &entries(&["example.com"])));
    }
}
