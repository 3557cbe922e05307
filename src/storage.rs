//! Archive layout on disk.
//!
//! One crawl writes into a single output directory:
//! `{root}/{index}.md` for each thread record and `{root}/{index}/` for its
//! attachments.

use std::path::{Path, PathBuf};

use crate::models::ThreadRecord;

/// Paths of the persisted archive for one crawl.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Construct the record path for a thread: `{root}/{index}.md`.
    pub fn record_path(&self, index: usize) -> PathBuf {
        self.root.join(format!("{}.md", index))
    }

    /// Construct the attachment directory for a thread: `{root}/{index}/`.
    pub fn attachment_dir(&self, index: usize) -> PathBuf {
        self.root.join(index.to_string())
    }

    /// Write a thread record. Records without a body are not written.
    pub async fn write_record(
        &self,
        index: usize,
        record: &ThreadRecord,
    ) -> std::io::Result<Option<PathBuf>> {
        let Some(content) = render_record(record) else {
            return Ok(None);
        };
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.record_path(index);
        tokio::fs::write(&path, content).await?;
        Ok(Some(path))
    }
}

/// Render a thread record as markdown, or None when it has no body.
pub fn render_record(record: &ThreadRecord) -> Option<String> {
    let body = record.body.as_deref()?;

    let mut out = format!("# {}\n\n원본 URL: {}\n\n", record.title, record.url);
    if let Some(author) = record.author.as_deref().filter(|a| !a.is_empty()) {
        out.push_str(&format!("작성자: {}\n\n", author));
    }
    if let Some(date) = record.date.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("작성일: {}\n\n", date));
    }
    out.push_str("## 내용\n\n");
    out.push_str(body);
    out.push('\n');
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(body: Option<&str>) -> ThreadRecord {
        ThreadRecord {
            title: "2025년 창업지원 공고".to_string(),
            body: body.map(str::to_string),
            url: "https://example.com/view?seq=1".to_string(),
            author: Some("관리자".to_string()),
            date: None,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_paths() {
        let layout = ArchiveLayout::new("/out");
        assert_eq!(layout.record_path(3), PathBuf::from("/out/3.md"));
        assert_eq!(layout.attachment_dir(3), PathBuf::from("/out/3"));
    }

    #[test]
    fn test_render_record() {
        let rendered = render_record(&record(Some("본문입니다."))).unwrap();
        assert_eq!(
            rendered,
            "# 2025년 창업지원 공고\n\n원본 URL: https://example.com/view?seq=1\n\n작성자: 관리자\n\n## 내용\n\n본문입니다.\n"
        );
        assert!(render_record(&record(None)).is_none());
    }

    #[tokio::test]
    async fn test_write_record_skips_missing_body() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(dir.path());

        assert_eq!(layout.write_record(1, &record(None)).await.unwrap(), None);
        assert!(!layout.record_path(1).exists());

        let path = layout.write_record(2, &record(Some("x"))).await.unwrap();
        assert_eq!(path, Some(layout.record_path(2)));
        assert!(std::fs::read_to_string(layout.record_path(2))
            .unwrap()
            .contains("## 내용"));
    }
}
