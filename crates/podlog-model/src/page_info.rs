use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next: bool,
    pub total: i64,
    pub current: i64,
    /// True when some matching data was dropped to stay within a byte or
    /// size limit, independent of ordinary pagination.
    pub is_partial_contents: bool,
}

impl PageInfo {
    pub fn new(current_page: i64, lines: i64, page_burst: i64, is_partial_contents: bool) -> Self {
        let page_burst = page_burst.max(1);
        let total_page = (lines as f64 / page_burst as f64).ceil() as i64;
        PageInfo {
            current: current_page,
            total: total_page,
            has_next: current_page < total_page,
            is_partial_contents,
        }
    }
}
