pub mod assemble;
pub mod broker;
pub mod entry_parse;
pub mod fetcher;
pub mod matcher;
pub mod peers;
pub mod request;
pub mod response;
pub mod subquery;
pub mod twophase;

pub use broker::{build_client, fan_out_chunks, Endpoint, FetchTimeouts};
pub use entry_parse::{parse_entries_from_raw, pin_page_bounds};
pub use fetcher::{fetch_range, fetch_series, FetchError, RangeContents};
pub use matcher::ChunkMatcher;
pub use peers::{resolve_clusters, resolve_ordinals, shard_of};
pub use request::Request;
pub use response::{RangeResponseV1, RangeResponseV2, SeriesResponse};
pub use subquery::{make_sub_query, PageBucket};
pub use twophase::{fetch_range_from_stores, fetch_series_from_stores, MergedRange};
