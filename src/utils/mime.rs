//! Content type to file extension mapping.

/// File extension (without dot) for a Content-Type header value.
///
/// Covers the families boards actually serve: PDF, Word, Excel, PowerPoint,
/// Hangul (HWP/HWPX), zip archives, images and plain text. Generic types
/// such as `application/octet-stream` yield None.
pub fn extension_for_content_type(content_type: &str) -> Option<String> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    let ext = match mime.as_str() {
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/x-hwp" | "application/haansofthwp" | "application/vnd.hancom.hwp" => "hwp",
        "application/haansofthwpx" | "application/vnd.hancom.hwpx" => "hwpx",
        "application/zip" | "application/x-zip-compressed" => "zip",
        "text/plain" => "txt",
        "image/jpeg" | "image/pjpeg" => "jpg",
        "image/svg+xml" => "svg",
        other => {
            let subtype = other.strip_prefix("image/")?;
            if subtype.is_empty() || !subtype.chars().all(|c| c.is_ascii_alphanumeric()) {
                return None;
            }
            return Some(subtype.to_string());
        }
    };
    Some(ext.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_families() {
        assert_eq!(extension_for_content_type("application/pdf").as_deref(), Some("pdf"));
        assert_eq!(
            extension_for_content_type("application/PDF; charset=binary").as_deref(),
            Some("pdf")
        );
        assert_eq!(extension_for_content_type("application/msword").as_deref(), Some("doc"));
        assert_eq!(
            extension_for_content_type("application/vnd.ms-excel").as_deref(),
            Some("xls")
        );
        assert_eq!(
            extension_for_content_type("application/x-hwp").as_deref(),
            Some("hwp")
        );
    }

    #[test]
    fn test_image_subtypes() {
        assert_eq!(extension_for_content_type("image/png").as_deref(), Some("png"));
        assert_eq!(extension_for_content_type("image/jpeg").as_deref(), Some("jpg"));
        assert_eq!(extension_for_content_type("image/svg+xml").as_deref(), Some("svg"));
        assert_eq!(extension_for_content_type("image/").as_deref(), None);
    }

    #[test]
    fn test_generic_types_have_no_extension() {
        assert_eq!(extension_for_content_type("application/octet-stream"), None);
        assert_eq!(extension_for_content_type("text/html; charset=utf-8"), None);
        assert_eq!(extension_for_content_type(""), None);
    }
}
