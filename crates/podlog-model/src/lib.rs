pub mod block;
pub mod bucket;
pub mod check_point;
pub mod chunk;
pub mod entry;
pub mod error;
pub mod labels;
pub mod logfile;
pub mod page_info;
pub mod series;
pub mod set_name;
pub mod source;

pub use block::{Block, ReadableBlock, TempBlock};
pub use bucket::{Bucket, BucketBuilder, BucketMetadata};
pub use check_point::CheckPoint;
pub use chunk::Chunk;
pub use entry::Entry;
pub use error::ApiError;
pub use labels::Labels;
pub use logfile::LogFile;
pub use page_info::PageInfo;
pub use series::{Sample, Series, SeriesData};
pub use source::Source;
