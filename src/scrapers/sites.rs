//! Builtin targets for the boards bizsup knows out of the box.

use std::collections::BTreeMap;

use super::config::TargetConfig;

const SITES_JSON: &str = include_str!("sites.json");

/// Builtin targets keyed by short name.
pub fn builtin_targets() -> Result<BTreeMap<String, TargetConfig>, serde_json::Error> {
    serde_json::from_str(SITES_JSON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::config::{ListingMode, PaginationMode, TextSource};
    use crate::scrapers::configurable::page_param::UrlPageParameter;

    #[test]
    fn test_builtin_targets_parse() {
        let targets = builtin_targets().unwrap();
        let names: Vec<&str> = targets.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["btp", "dip", "egbiz", "gntp", "jbba", "jbtp"]);
        for (name, target) in &targets {
            assert!(target.validate().is_ok(), "{} failed validation", name);
            assert!(!target.listing_rules.is_empty(), "{} has no listing rules", name);
        }
    }

    #[test]
    fn test_builtin_page_params() {
        let targets = builtin_targets().unwrap();
        let jbtp = &targets["jbtp"];
        let param = UrlPageParameter::new(jbtp.page_param.clone());
        assert_eq!(param.current_page(&jbtp.start_url), 1);
        assert!(param
            .next_page_url(&jbtp.start_url, 1)
            .ends_with("keyword=&pageNo=2"));
        assert_eq!(jbtp.attachments.text_from, TextSource::ParentOwnText);

        assert_eq!(targets["dip"].page_param, "sfpage");
        assert_eq!(targets["gntp"].page_param, "pageIndex");
        assert_eq!(targets["gntp"].pagination.rules.len(), 2);
        assert_eq!(targets["jbba"].link_filter.require_patterns, vec!["wr_id="]);
    }

    #[test]
    fn test_builtin_interactive_target() {
        let targets = builtin_targets().unwrap();
        let egbiz = &targets["egbiz"];
        assert_eq!(egbiz.pagination.mode, PaginationMode::Interactive);
        assert_eq!(egbiz.pagination.max_triggers, 6);
        assert_eq!(egbiz.pagination.settle_ms, 2000);
        assert_eq!(egbiz.listing_mode, ListingMode::Union);
        assert_eq!(egbiz.pagination.trigger_selectors[0], ".more-btn");
    }

    #[test]
    fn test_builtin_onclick_template() {
        let targets = builtin_targets().unwrap();
        let html = scraper::Html::parse_document(
            r#"<div class="board__item"><table>
                 <tr><th>번호</th></tr>
                 <tr onclick="read('dipadmin', '8482')"><td>공고</td></tr>
               </table></div>"#,
        );
        let values = targets["dip"].listing_rules[0].apply(&html);
        assert_eq!(
            values,
            vec!["https://www.dip.or.kr/home/notice/businessbbs/boardRead.ubs?fboardnum=8482&fboardcd=business&sfpage=1"]
        );
    }
}
