//! Crawl target configuration types.
//!
//! A target is plain data: the seed URL, how pages are numbered, and ordered
//! extraction rule lists for each field. The crawler and archiver are written
//! once and driven entirely by these tables.

use serde::{Deserialize, Serialize};
use url::Url;

use super::configurable::extract::ExtractionRule;
use crate::config::ConfigError;

/// Configuration for one bulletin board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Display name of the board.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// First listing page.
    pub start_url: String,
    /// Query parameter carrying the page number.
    #[serde(default = "default_page_param")]
    pub page_param: String,
    /// Maximum number of listing pages to traverse.
    #[serde(default = "default_page_bound")]
    pub page_bound: u32,
    #[serde(default, skip_serializing_if = "PaginationConfig::is_default")]
    pub pagination: PaginationConfig,
    /// Rules producing thread hrefs on a listing page.
    #[serde(default = "default_listing_rules")]
    pub listing_rules: Vec<ExtractionRule>,
    #[serde(default)]
    pub listing_mode: ListingMode,
    #[serde(default)]
    pub link_filter: LinkFilter,
    #[serde(default)]
    pub thread: ThreadRules,
    #[serde(default)]
    pub attachments: AttachmentRules,
}

impl TargetConfig {
    /// Minimal target using the generic rule sets.
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            name: None,
            start_url: start_url.into(),
            page_param: default_page_param(),
            page_bound: default_page_bound(),
            pagination: PaginationConfig::default(),
            listing_rules: default_listing_rules(),
            listing_mode: ListingMode::default(),
            link_filter: LinkFilter::default(),
            thread: ThreadRules::default(),
            attachments: AttachmentRules::default(),
        }
    }

    /// Get the effective name, using the provided default if not set.
    pub fn name_or(&self, default: &str) -> String {
        self.name.clone().unwrap_or_else(|| default.to_string())
    }

    /// Check the seed URL and bounds before a crawl starts.
    pub fn validate(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.start_url).map_err(|e| ConfigError::InvalidSeed {
            url: self.start_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidSeed {
                url: self.start_url.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        if self.page_bound == 0 {
            return Err(ConfigError::Invalid("page_bound must be at least 1".to_string()));
        }
        if self.pagination.mode == PaginationMode::Interactive
            && self.pagination.trigger_selectors.is_empty()
        {
            return Err(ConfigError::Invalid(
                "interactive pagination needs at least one trigger selector".to_string(),
            ));
        }
        Ok(url)
    }
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_page_bound() -> u32 {
    6
}

fn default_listing_rules() -> Vec<ExtractionRule> {
    vec![
        ExtractionRule::css("td.subject a").attr("href").multi(),
        ExtractionRule::css("td.title a").attr("href").multi(),
        ExtractionRule::css("td a").attr("href").multi(),
    ]
}

/// How listing rules are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingMode {
    /// First rule with any links wins.
    #[default]
    FirstMatch,
    /// Links from every rule are merged.
    Union,
}

/// Pagination variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    /// Follow page links or rewrite the page parameter.
    #[default]
    Url,
    /// Click a "more" control in a rendered page.
    Interactive,
}

/// How to reach the next listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default)]
    pub mode: PaginationMode,
    /// Rules yielding a next-page href. `{next}` in a selector is replaced
    /// with the next page number.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ExtractionRule>,
    /// Fall back to rewriting the page parameter when no rule matches.
    #[serde(default = "default_true")]
    pub rewrite: bool,
    /// Selectors of the "more" control, tried in order (interactive mode).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trigger_selectors: Vec<String>,
    /// Time to let new content settle after each trigger.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Maximum number of triggers (interactive mode).
    #[serde(default = "default_max_triggers")]
    pub max_triggers: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            mode: PaginationMode::Url,
            rules: Vec::new(),
            rewrite: true,
            trigger_selectors: Vec::new(),
            settle_ms: default_settle_ms(),
            max_triggers: default_max_triggers(),
        }
    }
}

impl PaginationConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

fn default_true() -> bool {
    true
}

fn default_settle_ms() -> u64 {
    2000
}

fn default_max_triggers() -> u32 {
    6
}

/// Skip links containing `contains` unless they also contain `unless`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRule {
    pub contains: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unless: Option<String>,
}

/// Filters separating genuine thread links from everything else a listing
/// links to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFilter {
    /// Substrings marking download/player links.
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
    /// Substrings a thread link must contain (all of them).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_if: Vec<SkipRule>,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self {
            exclude_patterns: default_exclude_patterns(),
            require_patterns: Vec::new(),
            skip_if: Vec::new(),
        }
    }
}

fn default_exclude_patterns() -> Vec<String> {
    ["download.php", "file_download", "player.php", "fileDown"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl LinkFilter {
    /// Whether an href (raw or absolute) looks like a thread link.
    pub fn accepts(&self, href: &str) -> bool {
        let href = href.trim();
        if href.is_empty() || href.contains('#') {
            return false;
        }
        let lower = href.to_lowercase();
        if lower.contains("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:")
        {
            return false;
        }
        if self.exclude_patterns.iter().any(|p| href.contains(p.as_str())) {
            return false;
        }
        if !self.require_patterns.iter().all(|p| href.contains(p.as_str())) {
            return false;
        }
        !self.skip_if.iter().any(|rule| {
            href.contains(rule.contains.as_str())
                && !rule.unless.as_ref().is_some_and(|u| href.contains(u.as_str()))
        })
    }
}

/// Rules for the fields of a thread page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRules {
    #[serde(default = "default_title_rules")]
    pub title_rules: Vec<ExtractionRule>,
    /// Rules yielding the body element's HTML.
    #[serde(default = "default_body_rules")]
    pub body_rules: Vec<ExtractionRule>,
    #[serde(default = "default_author_rules")]
    pub author_rules: Vec<ExtractionRule>,
    #[serde(default = "default_date_rules")]
    pub date_rules: Vec<ExtractionRule>,
    /// Query parameters identifying a thread, for the fallback title.
    #[serde(default = "default_id_params")]
    pub id_params: Vec<String>,
}

impl Default for ThreadRules {
    fn default() -> Self {
        Self {
            title_rules: default_title_rules(),
            body_rules: default_body_rules(),
            author_rules: default_author_rules(),
            date_rules: default_date_rules(),
            id_params: default_id_params(),
        }
    }
}

fn default_title_rules() -> Vec<ExtractionRule> {
    vec![
        ExtractionRule::css(".view-title"),
        ExtractionRule::css(".view_tit"),
        ExtractionRule::labelled("제목"),
        ExtractionRule::css("h1"),
        ExtractionRule::css("h2"),
    ]
}

fn default_body_rules() -> Vec<ExtractionRule> {
    vec![
        ExtractionRule::css(".view_cont").html(),
        ExtractionRule::css(".view-content").html(),
        ExtractionRule::labelled("내용").html(),
        ExtractionRule::css("div.content, div.article, article").html(),
    ]
}

fn default_author_rules() -> Vec<ExtractionRule> {
    vec![
        ExtractionRule::css(".writer"),
        ExtractionRule::labelled("작성자"),
    ]
}

fn default_date_rules() -> Vec<ExtractionRule> {
    vec![ExtractionRule::css(".date"), ExtractionRule::labelled("작성일")]
}

fn default_id_params() -> Vec<String> {
    ["seq", "dataSid", "boardId", "wr_id", "nttId"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Where an attachment's display text comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// The anchor's own text.
    #[default]
    Anchor,
    /// Direct text of the anchor's parent, for boards that place the filename
    /// beside a generic "download" button.
    ParentOwnText,
}

/// Rules for attachment anchors on a thread page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRules {
    /// Anchor selectors. Matches from all of them are merged and deduplicated
    /// by href.
    #[serde(default = "default_attachment_selectors")]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub text_from: TextSource,
    /// Substrings marking preview/player links.
    #[serde(default = "default_attachment_exclude")]
    pub exclude: Vec<String>,
    /// Query parameters used to synthesize `file_<id>_<seq>` names.
    #[serde(default = "default_file_id_params")]
    pub file_id_params: Vec<String>,
}

impl Default for AttachmentRules {
    fn default() -> Self {
        Self {
            selectors: default_attachment_selectors(),
            text_from: TextSource::default(),
            exclude: default_attachment_exclude(),
            file_id_params: default_file_id_params(),
        }
    }
}

impl AttachmentRules {
    /// Whether an attachment href points at a real file.
    pub fn accepts(&self, href: &str) -> bool {
        let href = href.trim();
        !href.is_empty()
            && !href.to_lowercase().starts_with("javascript:")
            && !href.contains('#')
            && !self.exclude.iter().any(|p| href.contains(p.as_str()))
    }
}

fn default_attachment_selectors() -> Vec<String> {
    [
        r#"a[href*="fileDown"]"#,
        r#"a[href*="download"]"#,
        r#"a[href*="attach"]"#,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_attachment_exclude() -> Vec<String> {
    vec!["player".to_string(), "preview".to_string()]
}

fn default_file_id_params() -> Vec<String> {
    vec!["fileId".to_string(), "fileSeq".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_config_json_deserialization() {
        let json = r#"{
            "name": "Example board",
            "start_url": "https://example.com/list.do?pageNo=1",
            "page_param": "pageNo",
            "listing_rules": [{"selector": "td.subject a", "kind": "attr:href", "cardinality": "multi"}],
            "link_filter": {"require_patterns": ["seq="]}
        }"#;
        let config: TargetConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name_or("x"), "Example board");
        assert_eq!(config.page_param, "pageNo");
        assert_eq!(config.page_bound, 6);
        assert_eq!(config.listing_rules.len(), 1);
        assert_eq!(config.link_filter.require_patterns, vec!["seq="]);
        assert_eq!(config.link_filter.exclude_patterns.len(), 4);
        assert_eq!(config.thread, ThreadRules::default());
        assert_eq!(config.pagination.mode, PaginationMode::Url);
        assert!(config.pagination.rewrite);
    }

    #[test]
    fn test_pagination_defaults() {
        let config = PaginationConfig::default();
        assert!(config.is_default());
        assert_eq!(config.settle_ms, 2000);
        assert_eq!(config.max_triggers, 6);
    }

    #[test]
    fn test_validate() {
        assert!(TargetConfig::new("https://example.com/list").validate().is_ok());
        assert!(TargetConfig::new("example.com/list").validate().is_err());
        assert!(TargetConfig::new("ftp://example.com/list").validate().is_err());

        let mut zero = TargetConfig::new("https://example.com/list");
        zero.page_bound = 0;
        assert!(zero.validate().is_err());

        let mut interactive = TargetConfig::new("https://example.com/");
        interactive.pagination.mode = PaginationMode::Interactive;
        assert!(interactive.validate().is_err());
        interactive.pagination.trigger_selectors = vec![".btn_more".to_string()];
        assert!(interactive.validate().is_ok());
    }

    #[test]
    fn test_link_filter_defaults() {
        let filter = LinkFilter::default();
        assert!(filter.accepts("/board/view.jbtp?dataSid=123"));
        assert!(!filter.accepts(""));
        assert!(!filter.accepts("#"));
        assert!(!filter.accepts("view.do?seq=1#comments"));
        assert!(!filter.accepts("javascript:fnView('1')"));
        assert!(!filter.accepts("mailto:admin@example.com"));
        assert!(!filter.accepts("/bbs/download.php?bo_table=a&wr_id=1"));
        assert!(!filter.accepts("/cmm/fileDown.do?fileId=3"));
        assert!(!filter.accepts("/media/player.php?id=4"));
    }

    #[test]
    fn test_link_filter_require_and_skip() {
        let filter = LinkFilter {
            require_patterns: vec!["Board.do".to_string()],
            skip_if: vec![SkipRule {
                contains: "pageIndex=".to_string(),
                unless: Some("seq=".to_string()),
            }],
            ..Default::default()
        };
        assert!(filter.accepts("/kor/CMS/Board/Board.do?mCode=MN013&mode=view&seq=77"));
        assert!(filter.accepts("/kor/CMS/Board/Board.do?pageIndex=2&seq=77"));
        assert!(!filter.accepts("/kor/CMS/Board/Board.do?pageIndex=2"));
        assert!(!filter.accepts("/kor/CMS/Other.do?seq=77"));
    }

    #[test]
    fn test_attachment_rules_accepts() {
        let rules = AttachmentRules::default();
        assert!(rules.accepts("/cmm/fileDown.do?fileId=1&fileSeq=0"));
        assert!(!rules.accepts("javascript:download(1)"));
        assert!(!rules.accepts("#none"));
        assert!(!rules.accepts("/viewer/preview.do?fileId=1"));
        assert!(!rules.accepts("/player.php?f=2"));
    }
}
