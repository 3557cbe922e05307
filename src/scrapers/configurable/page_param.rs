//! Pagination query parameter parsing and rewriting.
//!
//! Query strings are handled as raw `key=value` pairs so that every parameter
//! other than the page number survives a rewrite byte for byte, including
//! values the board already percent-encoded (or forgot to).

/// A URL query parameter carrying the listing page number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPageParameter {
    param: String,
}

impl UrlPageParameter {
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }

    /// Name of the parameter.
    pub fn name(&self) -> &str {
        &self.param
    }

    /// Page number encoded in `url`, or 1 when absent or not a positive integer.
    pub fn current_page(&self, url: &str) -> u32 {
        self.page_value(url).unwrap_or(1)
    }

    /// Page number encoded in `url`, if any.
    pub fn page_value(&self, url: &str) -> Option<u32> {
        let (_, query, _) = split_url(url);
        parse_query(query?)
            .into_iter()
            .find(|(key, _)| *key == self.param)
            .and_then(|(_, value)| value.trim().parse::<u32>().ok())
            .filter(|page| *page > 0)
    }

    /// `url` with the page parameter set to `current_page + 1`.
    ///
    /// An existing occurrence is rewritten in place; otherwise the parameter
    /// is appended. Query segments without `=` are dropped.
    pub fn next_page_url(&self, url: &str, current_page: u32) -> String {
        self.page_url(url, current_page.saturating_add(1))
    }

    /// `url` with the page parameter set to `page`.
    pub fn page_url(&self, url: &str, page: u32) -> String {
        let (base, query, fragment) = split_url(url);
        let page = page.to_string();

        let mut pairs = query.map(parse_query).unwrap_or_default();
        let mut replaced = false;
        pairs.retain_mut(|(key, value)| {
            if *key != self.param {
                return true;
            }
            if replaced {
                // duplicate page parameter
                return false;
            }
            *value = page.as_str();
            replaced = true;
            true
        });
        if !replaced {
            pairs.push((self.param.as_str(), page.as_str()));
        }

        let query = pairs
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");

        match fragment {
            Some(fragment) => format!("{}?{}#{}", base, query, fragment),
            None => format!("{}?{}", base, query),
        }
    }
}

/// Split a URL into (everything before `?`, query, fragment).
fn split_url(url: &str) -> (&str, Option<&str>, Option<&str>) {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (url, None),
    };
    match rest.split_once('?') {
        Some((base, query)) => (base, Some(query), fragment),
        None => (rest, None, fragment),
    }
}

/// Parse a raw query string into ordered pairs, dropping segments without `=`.
fn parse_query(query: &str) -> Vec<(&str, &str)> {
    query
        .split('&')
        .filter_map(|segment| segment.split_once('='))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        let (_, query, _) = split_url(url);
        query
            .map(parse_query)
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_current_page_absent_defaults_to_one() {
        let param = UrlPageParameter::new("pageNo");
        assert_eq!(param.current_page("https://example.com/list"), 1);
        assert_eq!(param.current_page("https://example.com/list?boardId=3"), 1);
        assert_eq!(param.current_page("https://example.com/list?mypageNo=4"), 1);
    }

    #[test]
    fn test_current_page_unparsable_defaults_to_one() {
        let param = UrlPageParameter::new("page");
        assert_eq!(param.current_page("https://example.com/?page=abc"), 1);
        assert_eq!(param.current_page("https://example.com/?page="), 1);
        assert_eq!(param.current_page("https://example.com/?page=0"), 1);
        assert_eq!(param.current_page("https://example.com/?page=-2"), 1);
    }

    #[test]
    fn test_current_page_parsed() {
        let param = UrlPageParameter::new("pageNo");
        assert_eq!(
            param.current_page("https://www.jbtp.or.kr/board/list.jbtp?boardId=BBS_0000006&paging=ok&pageNo=4"),
            4
        );
        assert_eq!(param.current_page("https://example.com/?pageNo=12#top"), 12);
    }

    #[test]
    fn test_next_page_rewrites_existing_param() {
        let param = UrlPageParameter::new("sfpage");
        let url = "https://www.dip.or.kr/home/notice/businessbbs/boardList.ubs?sfpsize=10&fboardcd=business&sfkind=&sfpage=1";
        let next = param.next_page_url(url, 1);
        assert_eq!(
            next,
            "https://www.dip.or.kr/home/notice/businessbbs/boardList.ubs?sfpsize=10&fboardcd=business&sfkind=&sfpage=2"
        );
    }

    #[test]
    fn test_next_page_preserves_other_params() {
        let param = UrlPageParameter::new("page");
        let url = "https://example.com/board?bo_table=sub01_09&sca=%EA%B3%B5%EA%B3%A0&page=3&sst=wr_datetime";
        let next = param.next_page_url(url, param.current_page(url));

        let before = query_pairs(url);
        let after = query_pairs(&next);
        for (key, value) in before.iter().filter(|(k, _)| k != "page") {
            assert!(after.contains(&(key.clone(), value.clone())), "lost {}", key);
        }
        assert!(after.contains(&("page".to_string(), "4".to_string())));
        assert_eq!(after.len(), before.len());
    }

    #[test]
    fn test_next_page_appends_missing_param() {
        let param = UrlPageParameter::new("pageIndex");
        assert_eq!(
            param.next_page_url("https://example.com/Board.do?mCode=MN013", 1),
            "https://example.com/Board.do?mCode=MN013&pageIndex=2"
        );
        assert_eq!(
            param.next_page_url("https://example.com/list", 1),
            "https://example.com/list?pageIndex=2"
        );
    }

    #[test]
    fn test_next_page_drops_malformed_segments() {
        let param = UrlPageParameter::new("page");
        assert_eq!(
            param.next_page_url("https://example.com/?robot&a=1&&page=2", 2),
            "https://example.com/?a=1&page=3"
        );
    }

    #[test]
    fn test_next_page_collapses_duplicate_param() {
        let param = UrlPageParameter::new("page");
        assert_eq!(
            param.next_page_url("https://example.com/?page=1&q=x&page=9", 1),
            "https://example.com/?page=2&q=x"
        );
    }

    #[test]
    fn test_next_page_keeps_fragment() {
        let param = UrlPageParameter::new("page");
        assert_eq!(
            param.next_page_url("https://example.com/?page=1#list", 1),
            "https://example.com/?page=2#list"
        );
    }
}
