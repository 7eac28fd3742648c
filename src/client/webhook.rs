//! Reqwest-based webhook delivery of rotated sequences.
//!
//! Notifications run on a blocking thread, so this uses the blocking
//! client. The client is built lazily on first use so that constructing a
//! notifier from async code never touches reqwest's internal runtime.

use crate::client::template::PayloadTemplate;
use crate::config::WebhookConfig;
use crate::rotation::Notifier;
use crate::KnockGateError;
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use std::time::Duration;

/// Default request timeout for webhook delivery.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// POSTs rotated sequences to a webhook.
pub struct WebhookNotifier {
    client: OnceCell<Client>,
    url: String,
    template: PayloadTemplate,
    user_agent: String,
    timeout: Duration,
}

impl WebhookNotifier {
    /// Create a notifier from webhook config.
    ///
    /// # Errors
    /// `TemplateError` if the payload template is not valid JSON.
    pub fn new(config: &WebhookConfig) -> Result<Self, KnockGateError> {
        let template = PayloadTemplate::parse(&config.template)?;
        Ok(Self {
            client: OnceCell::new(),
            url: config.url.clone(),
            template,
            user_agent: build_user_agent(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = OnceCell::new();
        self
    }

    /// The JSON body that would be sent for these sequences.
    pub fn payload(&self, open: &[String], close: &[String]) -> serde_json::Value {
        self.template.render(open, close)
    }

    fn client(&self) -> Result<&Client, KnockGateError> {
        self.client.get_or_try_init(|| {
            Client::builder().timeout(self.timeout).build().map_err(|e| {
                KnockGateError::NotifyTransport(format!("Failed to create client: {}", e))
            })
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, open: &[String], close: &[String]) -> Result<(), KnockGateError> {
        let body = self.payload(open, close);

        let response = self
            .client()?
            .post(&self.url)
            .header(USER_AGENT, &self.user_agent)
            .json(&body)
            .send()
            .map_err(|e| KnockGateError::NotifyTransport(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KnockGateError::NotifyRejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!(url = %self.url, status = status.as_u16(), "rotation notification delivered");
        Ok(())
    }
}

/// User-Agent sent with webhook requests.
///
/// Format: `knockgate/<version>`
pub fn build_user_agent() -> String {
    format!("knockgate/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn seq(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn webhook(url: String) -> WebhookConfig {
        WebhookConfig {
            url,
            template: r#"{"open":"{{openSequence}}","close":"{{closeSequence}}"}"#.to_string(),
        }
    }

    /// Accept one request, answer with `status_line`, return the request body.
    fn serve_once(status_line: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut body = vec![0; content_length];
            reader.read_exact(&mut body).unwrap();

            let mut stream = reader.into_inner();
            write!(stream, "{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line)
                .unwrap();
            String::from_utf8(body).unwrap()
        });

        (url, handle)
    }

    #[test]
    fn test_build_user_agent() {
        let ua = build_user_agent();
        assert_eq!(ua, format!("knockgate/{}", env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_payload_uses_template() {
        let notifier = WebhookNotifier::new(&webhook("http://localhost/".to_string())).unwrap();
        let payload = notifier.payload(&seq(&["/a", "/b"]), &seq(&["/b", "/a"]));
        assert_eq!(payload["open"], "/a,/b");
        assert_eq!(payload["close"], "/b,/a");
    }

    #[test]
    fn test_invalid_template_rejected() {
        let config = WebhookConfig {
            url: "http://localhost/".to_string(),
            template: "nope".to_string(),
        };
        assert!(matches!(
            WebhookNotifier::new(&config),
            Err(KnockGateError::TemplateError(_))
        ));
    }

    #[test]
    fn test_notify_posts_rendered_payload() {
        let (url, server) = serve_once("HTTP/1.1 204 No Content");
        let notifier = WebhookNotifier::new(&webhook(url)).unwrap();

        notifier
            .notify(&seq(&["/x", "/y", "/z"]), &seq(&["/z", "/y", "/x"]))
            .unwrap();

        let body: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(body["open"], "/x,/y,/z");
        assert_eq!(body["close"], "/z,/y,/x");
    }

    #[test]
    fn test_notify_reports_rejection() {
        let (url, server) = serve_once("HTTP/1.1 500 Internal Server Error");
        let notifier = WebhookNotifier::new(&webhook(url)).unwrap();

        let result = notifier.notify(&seq(&["/a"]), &seq(&["/a"]));
        assert!(matches!(
            result,
            Err(KnockGateError::NotifyRejected { status: 500 })
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_notify_reports_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let notifier = WebhookNotifier::new(&webhook(format!("http://127.0.0.1:{}/", port)))
            .unwrap()
            .with_timeout(Duration::from_secs(2));

        let result = notifier.notify(&seq(&["/a"]), &seq(&["/a"]));
        assert!(matches!(result, Err(KnockGateError::NotifyTransport(_))));
    }
}
