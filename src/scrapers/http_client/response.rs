//! HTTP response wrappers and session cookies.

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use reqwest::{Response, StatusCode};

/// Cookies captured from a page response, forwarded to attachment requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies(Vec<(String, String)>);

impl SessionCookies {
    /// Parse `Set-Cookie` header values, keeping the `name=value` part.
    pub fn from_set_cookie<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut cookies = Self::default();
        for value in values {
            let pair = value.split(';').next().unwrap_or_default();
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    cookies.insert(name, value.trim());
                }
            }
        }
        cookies
    }

    /// Set a cookie, replacing any earlier value with the same name.
    pub fn insert(&mut self, name: &str, value: &str) {
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value.to_string(),
            None => self.0.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Value for a `Cookie` request header.
    pub fn header_value(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        Some(
            self.0
                .iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    /// Body decoded using the declared charset.
    pub body: String,
    pub cookies: SessionCookies,
}

/// Streaming HTTP response wrapper.
pub struct HttpResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub cookies: SessionCookies,
    pub(crate) response: Response,
}

impl HttpResponse {
    pub(crate) fn new(response: Response) -> Self {
        let headers = collect_headers(response.headers());
        let cookies = SessionCookies::from_set_cookie(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );
        Self {
            url: response.url().to_string(),
            status: response.status(),
            headers,
            cookies,
            response,
        }
    }

    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Get the raw Content-Disposition header.
    pub fn content_disposition(&self) -> Option<&str> {
        self.headers.get("content-disposition").map(|s| s.as_str())
    }

    /// Next chunk of the body, or None at the end.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, reqwest::Error> {
        self.response.chunk().await
    }

    /// Get response body as text, decoded with the declared charset.
    pub async fn text(self) -> Result<String, reqwest::Error> {
        self.response.text().await
    }
}

/// Collect headers into a lowercase-keyed map.
///
/// Boards commonly send raw UTF-8 filenames in Content-Disposition, which
/// `HeaderValue::to_str` rejects; those values are recovered as UTF-8.
/// Values that are neither ASCII nor UTF-8 are left out.
pub(crate) fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| header_string(v).map(|s| (k.as_str().to_lowercase(), s)))
        .collect()
}

fn header_string(value: &HeaderValue) -> Option<String> {
    match value.to_str() {
        Ok(s) => Some(s.to_string()),
        Err(_) => String::from_utf8(value.as_bytes().to_vec()).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookies_from_set_cookie() {
        let cookies = SessionCookies::from_set_cookie([
            "JSESSIONID=abc123; Path=/; HttpOnly",
            "WMONID=xyz; Expires=Wed, 01 Jan 2031 00:00:00 GMT",
            "malformed",
            "=novalue",
        ]);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies.get("JSESSIONID"), Some("abc123"));
        assert_eq!(
            cookies.header_value(),
            Some("JSESSIONID=abc123; WMONID=xyz".to_string())
        );
    }

    #[test]
    fn test_session_cookies_replace_same_name() {
        let cookies = SessionCookies::from_set_cookie(["a=1", "b=2", "a=3"]);
        assert_eq!(cookies.header_value(), Some("a=3; b=2".to_string()));
    }

    #[test]
    fn test_empty_cookies_have_no_header() {
        assert_eq!(SessionCookies::default().header_value(), None);
    }

    #[test]
    fn test_collect_headers_recovers_utf8() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Content-Disposition",
            HeaderValue::from_bytes("attachment; filename=\"보고서.pdf\"".as_bytes()).unwrap(),
        );
        headers.insert("Content-Type", HeaderValue::from_static("application/pdf"));
        headers.insert(
            "X-Legacy",
            HeaderValue::from_bytes(&[0xba, 0xb8, 0xb0, 0xed]).unwrap(),
        );

        let map = collect_headers(&headers);
        assert_eq!(
            map.get("content-disposition").map(String::as_str),
            Some("attachment; filename=\"보고서.pdf\"")
        );
        assert_eq!(map.get("content-type").map(String::as_str), Some("application/pdf"));
        assert!(!map.contains_key("x-legacy"));
    }
}
