//! CAS proxy-ticket acquisition.
//!
//! Uses the CAS 2.0 `/proxy` endpoint: given the user's proxy-granting
//! ticket and a target service URL, CAS answers with a one-time proxy
//! ticket inside a `cas:serviceResponse` document.

use futures_util::future::BoxFuture;
use reqwest::Client;
use url::Url;

use crate::client::ticket::{ProxyTicketSource, TicketError};

#[derive(Debug, Clone)]
pub struct CasProxyTicketSource {
    http: Client,
    server_url: Url,
    proxy_granting_ticket: String,
}

impl CasProxyTicketSource {
    pub fn new(http: Client, server_url: Url, proxy_granting_ticket: impl Into<String>) -> Self {
        Self {
            http,
            server_url,
            proxy_granting_ticket: proxy_granting_ticket.into(),
        }
    }

    fn proxy_endpoint(&self) -> Url {
        let mut url = self.server_url.clone();
        let path = format!("{}/proxy", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url
    }

    async fn request_ticket(&self, target: &Url) -> Result<String, TicketError> {
        let body = self
            .http
            .get(self.proxy_endpoint())
            .query(&[
                ("targetService", target.as_str()),
                ("pgt", self.proxy_granting_ticket.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_proxy_response(&body)
    }
}

impl ProxyTicketSource for CasProxyTicketSource {
    fn proxy_ticket_for<'a>(&'a self, target: &'a Url) -> BoxFuture<'a, Result<String, TicketError>> {
        Box::pin(self.request_ticket(target))
    }
}

/// Pull the ticket out of a CAS `/proxy` response body.
pub fn parse_proxy_response(body: &str) -> Result<String, TicketError> {
    let body = strip_comments(body);
    if let Some(ticket) = element_text(&body, "cas:proxyTicket") {
        if ticket.is_empty() {
            return Err(TicketError::Malformed("empty proxy ticket".into()));
        }
        return Ok(ticket.to_string());
    }
    if let Some(failure) = element_text(&body, "cas:proxyFailure") {
        return Err(TicketError::Rejected(failure.to_string()));
    }
    Err(TicketError::Malformed(body.chars().take(200).collect()))
}

/// The body with every `<!-- ... -->` removed. An unterminated comment
/// swallows the rest of the document.
fn strip_comments(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        rest = match rest[start + 4..].find("-->") {
            Some(end) => &rest[start + 4 + end + 3..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

/// Trimmed text of the first `<tag>` or `<tag attr=...>` element, with a
/// CDATA wrapper removed. Nested elements are not interpreted.
fn element_text<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open_tag = format!("<{tag}");
    let mut from = 0;
    let content_start = loop {
        let open = from + body[from..].find(&open_tag)?;
        let after = open + open_tag.len();
        match body[after..].chars().next()? {
            '>' => break after + 1,
            c if c.is_whitespace() => break after + body[after..].find('>')? + 1,
            _ => from = after,
        }
    };
    let close = body[content_start..].find(&format!("</{tag}>"))?;
    let text = body[content_start..content_start + close].trim();
    Some(
        text.strip_prefix("<![CDATA[")
            .and_then(|t| t.strip_suffix("]]>"))
            .map(str::trim)
            .unwrap_or(text),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:proxySuccess>
                <cas:proxyTicket>PT-957-ZuucXqTZ1YcJw81T3dxf</cas:proxyTicket>
            </cas:proxySuccess>
        </cas:serviceResponse>"#;
        assert_eq!(parse_proxy_response(body).unwrap(), "PT-957-ZuucXqTZ1YcJw81T3dxf");
    }

    #[test]
    fn test_parse_tolerates_comments_cdata_and_similar_tags() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <!-- <cas:proxyTicket>PT-commented-out</cas:proxyTicket> -->
            <cas:proxySuccess>
                <cas:proxyTicketIssued>2026-10-18</cas:proxyTicketIssued>
                <cas:proxyTicket>
                    <![CDATA[ PT-42-abc ]]>
                </cas:proxyTicket>
            </cas:proxySuccess>
        </cas:serviceResponse>"#;
        assert_eq!(parse_proxy_response(body).unwrap(), "PT-42-abc");
    }

    #[test]
    fn test_unterminated_comment_is_malformed() {
        let body = "<cas:serviceResponse><!-- <cas:proxyTicket>PT-1</cas:proxyTicket>";
        assert!(matches!(parse_proxy_response(body), Err(TicketError::Malformed(_))));
    }

    #[test]
    fn test_parse_failure() {
        let body = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:proxyFailure code="INVALID_TICKET">
                pgt PGT-1 not recognized
            </cas:proxyFailure>
        </cas:serviceResponse>"#;
        match parse_proxy_response(body).unwrap_err() {
            TicketError::Rejected(msg) => assert_eq!(msg, "pgt PGT-1 not recognized"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_proxy_response("<html>oops</html>"),
            Err(TicketError::Malformed(_))
        ));
    }

    #[test]
    fn test_proxy_endpoint() {
        let source = CasProxyTicketSource::new(
            Client::new(),
            Url::parse("https://cas.example.org/cas-server/").unwrap(),
            "PGT-1",
        );
        assert_eq!(source.proxy_endpoint().as_str(), "https://cas.example.org/cas-server/proxy");
    }
}
