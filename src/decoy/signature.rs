//! Browser family detection from the `User-Agent` header.
//!
//! Follows the checks nginx itself performs, so the decoy pads exactly
//! where a real nginx would.

/// Browser families that matter for error page padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    /// Internet Explorer (`MSIE ` token, not Opera).
    InternetExplorer,
    /// Chrome (`Chrome/` token, not Gecko-based).
    Chrome,
    /// Anything else, including a missing header.
    Other,
}

impl BrowserFamily {
    /// Classify a `User-Agent` value.
    pub fn detect(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent else {
            return Self::Other;
        };

        let opera = ua.contains("Opera");

        // nginx only trusts the MSIE token when a version follows it.
        let msie = !opera
            && ua
                .find("MSIE ")
                .is_some_and(|pos| pos + 7 < ua.len());

        if msie {
            return Self::InternetExplorer;
        }
        if !opera && !ua.contains("Gecko/") && ua.contains("Chrome/") {
            return Self::Chrome;
        }
        Self::Other
    }

    /// Whether this browser swaps short error bodies for its own page.
    pub fn replaces_short_errors(self) -> bool {
        matches!(self, Self::InternetExplorer | Self::Chrome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IE10: &str = "Mozilla/5.0 (compatible; MSIE 10.0; Windows NT 6.1)";
    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const FIREFOX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const OPERA_AS_IE: &str = "Mozilla/4.0 (compatible; MSIE 6.0; Windows NT 5.1; en) Opera 8.50";

    #[test]
    fn test_detects_ie() {
        assert_eq!(
            BrowserFamily::detect(Some(IE10)),
            BrowserFamily::InternetExplorer
        );
    }

    #[test]
    fn test_detects_chrome() {
        assert_eq!(BrowserFamily::detect(Some(CHROME)), BrowserFamily::Chrome);
    }

    #[test]
    fn test_firefox_is_other() {
        assert_eq!(BrowserFamily::detect(Some(FIREFOX)), BrowserFamily::Other);
    }

    #[test]
    fn test_opera_masquerading_as_ie_is_other() {
        assert_eq!(
            BrowserFamily::detect(Some(OPERA_AS_IE)),
            BrowserFamily::Other
        );
    }

    #[test]
    fn test_truncated_msie_token_is_other() {
        assert_eq!(BrowserFamily::detect(Some("MSIE 6")), BrowserFamily::Other);
    }

    #[test]
    fn test_missing_and_tool_agents_are_other() {
        assert_eq!(BrowserFamily::detect(None), BrowserFamily::Other);
        assert_eq!(
            BrowserFamily::detect(Some("curl/8.5.0")),
            BrowserFamily::Other
        );
    }

    #[test]
    fn test_padding_families() {
        assert!(BrowserFamily::InternetExplorer.replaces_short_errors());
        assert!(BrowserFamily::Chrome.replaces_short_errors());
        assert!(!BrowserFamily::Other.replaces_short_errors());
    }
}
