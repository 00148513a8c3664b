use serde::{Deserialize, Serialize};

use podlog_model::{Entry, PageInfo, SeriesData};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResponse {
    pub series: SeriesData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeResponseV1 {
    pub contents: String,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeResponseV2 {
    pub contents: Vec<Entry>,
    pub page_info: PageInfo,
}
