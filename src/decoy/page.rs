//! nginx default `500 Internal Server Error` page.

use crate::protocol::models::HttpReply;

/// Product name advertised in the `Server` header and page footer.
pub const SERVER_PRODUCT: &str = "nginx";

/// Comment line nginx appends so IE and Chrome show the real page.
pub const PADDING_LINE: &str =
    "<!-- a padding to disable MSIE and Chrome friendly error page -->\r\n";

/// Number of padding lines nginx appends.
pub const PADDING_LINES: usize = 6;

/// Build the page body for the given nginx version.
pub fn error_page_body(version: &str, padded: bool) -> String {
    let mut body = format!(
        "<html>\r\n\
         <head><title>500 Internal Server Error</title></head>\r\n\
         <body bgcolor=\"white\">\r\n\
         <center><h1>500 Internal Server Error</h1></center>\r\n\
         <hr><center>{}/{}</center>\r\n\
         </body>\r\n\
         </html>\r\n",
        SERVER_PRODUCT, version
    );
    if padded {
        body.push_str(&PADDING_LINE.repeat(PADDING_LINES));
    }
    body
}

/// Full decoy reply: status, nginx header set and body.
pub fn error_page(version: &str, padded: bool, date: String) -> HttpReply {
    let body = error_page_body(version, padded).into_bytes();

    let headers = vec![
        ("Server".to_string(), format!("{}/{}", SERVER_PRODUCT, version)),
        ("Date".to_string(), date),
        ("Content-Type".to_string(), "text/html".to_string()),
        ("Content-Length".to_string(), body.len().to_string()),
        ("Connection".to_string(), "close".to_string()),
    ];

    HttpReply {
        status: 500,
        reason: "Internal Server Error",
        headers,
        body,
        keep_alive: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_has_seven_lines() {
        let body = error_page_body("1.15.1", false);
        assert_eq!(body.matches("\r\n").count(), 7);
        assert!(body.contains("<hr><center>nginx/1.15.1</center>\r\n"));
        assert!(body.ends_with("</html>\r\n"));
    }

    #[test]
    fn test_body_length_fixed_per_version() {
        assert_eq!(error_page_body("1.15.1", false).len(), 193);
        assert_eq!(error_page_body("1.15.1", true).len(), 193 + 6 * 67);
    }

    #[test]
    fn test_padding_appended_after_html() {
        let body = error_page_body("1.15.1", true);
        let (page, padding) = body.split_at(193);
        assert!(page.ends_with("</html>\r\n"));
        assert_eq!(padding.matches(PADDING_LINE).count(), PADDING_LINES);
    }

    #[test]
    fn test_headers_in_nginx_order() {
        let reply = error_page("1.15.1", false, "Wed, 15 Jan 2025 12:00:00 GMT".to_string());
        let names: Vec<&str> = reply.headers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            ["Server", "Date", "Content-Type", "Content-Length", "Connection"]
        );
        assert_eq!(reply.header("Server"), Some("nginx/1.15.1"));
        assert_eq!(reply.header("Content-Length"), Some("193"));
        assert_eq!(reply.status, 500);
        assert!(!reply.keep_alive);
    }
}
