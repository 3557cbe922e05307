//! Local filename resolution for downloaded attachments.
//!
//! Every input here comes from the board: anchor text, query strings and
//! response headers. None of it is trusted as a path segment.

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::utils::{extension_for_content_type, query_param};

/// Default bound on resolved filename length, in characters.
pub const MAX_FILENAME_LEN: usize = 100;

/// Name used when every other source sanitizes away to nothing.
const LAST_RESORT_NAME: &str = "attachment";

/// Derives a safe, extension-complete filename for an attachment.
#[derive(Debug, Clone)]
pub struct FilenameResolver {
    max_len: usize,
    file_id_params: Vec<String>,
}

impl Default for FilenameResolver {
    fn default() -> Self {
        Self::new(vec!["fileId".to_string(), "fileSeq".to_string()])
    }
}

impl FilenameResolver {
    /// `file_id_params` name the query parameters identifying a file, in the
    /// order they appear in synthesized names.
    pub fn new(file_id_params: Vec<String>) -> Self {
        Self {
            max_len: MAX_FILENAME_LEN,
            file_id_params,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.max(1);
        self
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Resolve the filename for an attachment.
    ///
    /// Precedence: the server's Content-Disposition filename, then the anchor
    /// text, then a name synthesized from the URL. A missing extension is
    /// inferred from `content_type`. The result only contains alphanumerics,
    /// spaces, `.`, `_` and `-`, is never empty and never exceeds the bound.
    pub fn resolve(
        &self,
        link_text: &str,
        url: &str,
        content_disposition: Option<&str>,
        content_type: Option<&str>,
    ) -> String {
        let from_header = content_disposition
            .and_then(parse_content_disposition_filename)
            .map(|name| sanitize_filename(&name))
            .filter(|name| !name.is_empty());
        if content_disposition.is_some() && from_header.is_none() {
            debug!("Unusable Content-Disposition for {}, falling back", url);
        }

        let mut name = from_header
            .or_else(|| Some(sanitize_filename(link_text)).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| self.synthesize(url));

        if !has_extension(&name) {
            if let Some(ext) = content_type.and_then(extension_for_content_type) {
                name = format!("{}.{}", name, ext);
            }
        }

        let name = truncate_preserving_extension(&sanitize_filename(&name), self.max_len);
        if name.is_empty() {
            truncate_preserving_extension(LAST_RESORT_NAME, self.max_len)
        } else {
            name
        }
    }

    /// `file_<id>_<seq>` from the URL's identifying parameters, or a short
    /// URL hash when none are present.
    fn synthesize(&self, url: &str) -> String {
        let values: Vec<Option<String>> = self
            .file_id_params
            .iter()
            .map(|param| query_param(url, param))
            .collect();

        if values.iter().any(Option::is_some) {
            let parts: Vec<String> = values
                .into_iter()
                .enumerate()
                .map(|(i, v)| v.unwrap_or_else(|| if i == 0 { "unknown" } else { "0" }.to_string()))
                .collect();
            let name = sanitize_filename(&format!("file_{}", parts.join("_")));
            if !name.is_empty() {
                return name;
            }
        }

        let digest = Sha256::digest(url.as_bytes());
        format!("file_{}", hex::encode(&digest[..4]))
    }
}

/// Parse the filename from a Content-Disposition header value.
///
/// `filename*=` (RFC 5987) is preferred over `filename=`. Percent-encoded
/// names are decoded and must be valid UTF-8; otherwise that form is
/// treated as absent.
pub fn parse_content_disposition_filename(header: &str) -> Option<String> {
    if let Some(start) = header.find("filename*=") {
        let rest = &header[start + 10..];
        if let Some(quote_start) = rest.find("''") {
            let encoded = rest[quote_start + 2..]
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .trim_matches('"');
            if let Some(decoded) = percent_decode_utf8(encoded) {
                let filename = decoded.trim().to_string();
                if !filename.is_empty() {
                    return Some(filename);
                }
            }
        }
    }

    let lower = header.to_lowercase();
    let start = find_plain_filename(&lower)?;
    let rest = header[start + 9..].trim_start();
    let raw = if let Some(quoted) = rest.strip_prefix('"') {
        quoted.split('"').next()
    } else {
        rest.split(';').next()
    }?;
    let raw = raw.trim().trim_matches('\'');

    let name = if raw.contains('%') {
        percent_decode_utf8(raw)?
    } else {
        raw.to_string()
    };
    let name = name.trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Byte offset of a `filename=` parameter that is not `filename*=`.
fn find_plain_filename(lower: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = lower[offset..].find("filename=") {
        let start = offset + pos;
        if !lower[..start].ends_with('*') {
            return Some(start);
        }
        offset = start + 9;
    }
    None
}

fn percent_decode_utf8(encoded: &str) -> Option<String> {
    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    String::from_utf8(bytes.into_owned()).ok()
}

/// Keep alphanumerics, spaces, `.`, `_` and `-`; trim; drop leading dots.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect();
    let kept = kept.trim().trim_start_matches('.').trim();
    if kept.chars().all(|c| c == '.') {
        return String::new();
    }
    kept.to_string()
}

/// Whether the final `.` segment is a 1-5 character alphanumeric extension.
pub fn has_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Cut `name` to `max` characters, keeping its extension when it has one.
fn truncate_preserving_extension(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    if has_extension(name) {
        if let Some((stem, ext)) = name.rsplit_once('.') {
            let keep = max.saturating_sub(ext.len() + 1);
            if keep > 0 {
                let stem: String = stem.chars().take(keep).collect();
                return format!("{}.{}", stem.trim_end(), ext);
            }
        }
    }
    name.chars().take(max).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> FilenameResolver {
        FilenameResolver::default()
    }

    fn is_safe(name: &str) -> bool {
        !name.is_empty()
            && name.chars().count() <= MAX_FILENAME_LEN
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
    }

    #[test]
    fn test_parse_content_disposition_quoted() {
        assert_eq!(
            parse_content_disposition_filename(r#"attachment; filename="document.pdf""#),
            Some("document.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_unquoted() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=document.pdf"),
            Some("document.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_rfc5987() {
        assert_eq!(
            parse_content_disposition_filename(
                "attachment; filename*=UTF-8''%EB%B3%B4%EA%B3%A0%EC%84%9C.pdf"
            ),
            Some("보고서.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_prefers_rfc5987() {
        let header = r#"attachment; filename="fallback.pdf"; filename*=UTF-8''preferred.pdf"#;
        assert_eq!(
            parse_content_disposition_filename(header),
            Some("preferred.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_percent_encoded_plain() {
        assert_eq!(
            parse_content_disposition_filename(
                r#"attachment; filename="%EB%B3%B4%EA%B3%A0%EC%84%9C.pdf""#
            ),
            Some("보고서.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_bad_encoding_is_none() {
        // EUC-KR bytes percent-encoded: not UTF-8
        assert_eq!(
            parse_content_disposition_filename(r#"attachment; filename="%BA%B8%B0%ED%BC%AD.pdf""#),
            None
        );
        assert_eq!(parse_content_disposition_filename("attachment"), None);
        assert_eq!(parse_content_disposition_filename(r#"attachment; filename="""#), None);
    }

    #[test]
    fn test_resolve_prefers_header() {
        let name = resolver().resolve(
            "첨부파일 다운로드",
            "https://example.com/down?fileId=1",
            Some(r#"attachment; filename="보고서.pdf""#),
            Some("application/octet-stream"),
        );
        assert_eq!(name, "보고서.pdf");
    }

    #[test]
    fn test_resolve_undecodable_header_falls_back_to_link_text() {
        let name = resolver().resolve(
            "2025 지원사업 공고문",
            "https://example.com/down?fileId=1",
            Some(r#"attachment; filename="%BA%B8%B0%ED%BC%AD.pdf""#),
            Some("application/pdf"),
        );
        assert_eq!(name, "2025 지원사업 공고문.pdf");
    }

    #[test]
    fn test_resolve_synthesizes_from_url() {
        let name = resolver().resolve(
            "  ",
            "https://example.com/cmm/fileDown.do?fileId=FILE_000123&fileSeq=2",
            None,
            Some("application/x-hwp"),
        );
        assert_eq!(name, "file_FILE_000123_2.hwp");

        let name = resolver().resolve("", "https://example.com/down?fileSeq=4", None, None);
        assert_eq!(name, "file_unknown_4");
    }

    #[test]
    fn test_resolve_synthesizes_hash_without_params() {
        let a = resolver().resolve("", "https://example.com/download.do?no=1", None, None);
        let b = resolver().resolve("", "https://example.com/download.do?no=2", None, None);
        assert!(a.starts_with("file_"));
        assert_ne!(a, b);
        assert_eq!(
            a,
            resolver().resolve("", "https://example.com/download.do?no=1", None, None)
        );
    }

    #[test]
    fn test_resolve_keeps_existing_extension() {
        let name = resolver().resolve("발표자료.pptx", "https://e.com/f", None, Some("application/pdf"));
        assert_eq!(name, "발표자료.pptx");
    }

    #[test]
    fn test_resolve_strips_path_characters() {
        let name = resolver().resolve("", "https://e.com/f", Some(r#"attachment; filename="../../etc/passwd""#), None);
        assert_eq!(name, "etcpasswd");
        assert!(is_safe(&name));

        let name = resolver().resolve("...", "https://e.com/f?fileId=9", None, None);
        assert_eq!(name, "file_9_0");
    }

    #[test]
    fn test_resolve_truncates_preserving_extension() {
        let long = "가".repeat(150);
        let name = resolver().resolve(&long, "https://e.com/f", None, Some("application/pdf"));
        assert_eq!(name.chars().count(), MAX_FILENAME_LEN);
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn test_resolve_output_always_safe() {
        let inputs = [
            ("", "", None, None),
            ("<script>", "not a url", Some("inline"), Some("text/html")),
            ("/\\:*?\"<>|", "https://e.com/?fileId=%2F%2E%2E", None, None),
            ("공고.hwp", "https://e.com/", Some("attachment; filename=\"a/b\\c.pdf\""), None),
            (".", "https://e.com/", Some("attachment; filename=\"...\""), None),
        ];
        for (text, url, cd, ct) in inputs {
            let name = resolver().resolve(text, url, cd, ct);
            assert!(is_safe(&name), "unsafe name {:?}", name);
        }
        let tiny = FilenameResolver::default().with_max_len(3);
        assert!(tiny.resolve("abcdef", "https://e.com/", None, Some("application/pdf")).chars().count() <= 3);
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension("a.pdf"));
        assert!(has_extension("공고문.hwpx"));
        assert!(!has_extension("a"));
        assert!(!has_extension(".pdf"));
        assert!(!has_extension("2025. 사업공고"));
        assert!(!has_extension("archive.tar-gz"));
        assert!(!has_extension("name.abcdef"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(" 공고(최종).pdf "), "공고최종.pdf");
        assert_eq!(sanitize_filename("..hidden"), "hidden");
        assert_eq!(sanitize_filename("..."), "");
        assert_eq!(sanitize_filename("a_b-c d.txt"), "a_b-c d.txt");
    }
}
