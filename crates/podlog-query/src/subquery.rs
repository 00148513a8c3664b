use chrono::{DateTime, Utc};
use podlog_model::{series::merged_samples, ApiError, PageInfo, SeriesData};

use crate::request::Request;

/// One page's time span and the sample size observed at its boundary,
/// produced by [`make_sub_query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub size: u64,
}

/// Builds the paging plan for a range request: merges every series' samples
/// into one sorted sequence, then walks it accumulating lines per
/// one-second sample until the running count exceeds `page_burst`, at which
/// point the current page closes at that sample's timestamp and a new one
/// opens at the same timestamp. Returns a narrowed sub-`Request` covering
/// just the selected page plus the resulting [`PageInfo`].
///
/// `req.page == -1` selects the last page. An out-of-range page is a
/// [`ApiError::BadRequest`].
pub fn make_sub_query(req: &Request, series: &SeriesData, page_burst: i64) -> Result<(Request, PageInfo), ApiError> {
    let samples = merged_samples(series);
    let page_burst = page_burst.max(1);

    let mut buckets: Vec<PageBucket> = Vec::new();
    if samples.is_empty() {
        buckets.push(PageBucket {
            start: req.start,
            end: req.end,
            size: 0,
        });
    } else {
        let mut cur_start = req.start;
        let mut running_lines: i64 = 0;
        let mut cur_size: u64 = 0;

        for sample in &samples {
            running_lines += sample.lines;
            cur_size = sample.size;

            if running_lines > page_burst {
                buckets.push(PageBucket {
                    start: cur_start,
                    end: sample.timestamp,
                    size: cur_size,
                });
                cur_start = sample.timestamp;
                running_lines = 0;
            }
        }
        buckets.push(PageBucket {
            start: cur_start,
            end: req.end,
            size: cur_size,
        });
    }

    let total = buckets.len() as i64;
    let page = if req.page == -1 { total } else { req.page };
    if page < 1 || page > total {
        return Err(ApiError::BadRequest);
    }

    let bucket = buckets[(page - 1) as usize];
    let mut sub = req.clone();
    sub.start = bucket.start;
    sub.end = bucket.end;

    let page_info = PageInfo {
        current: page,
        total,
        has_next: page < total,
        is_partial_contents: false,
    };

    Ok((sub, page_info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use podlog_model::{Sample, Series};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn uniform_series(total_lines: i64, span_secs: i64) -> SeriesData {
        let mut samples = Vec::new();
        let per_second = total_lines / span_secs;
        for s in 0..span_secs {
            samples.push(Sample {
                timestamp: ts(s),
                lines: per_second,
                size: 10,
            });
        }
        vec![Series {
            chunk_key: "k".into(),
            name: "s".into(),
            lines: total_lines,
            size: 10,
            samples,
        }]
    }

    #[test]
    fn pages_2500_lines_over_50s_into_3_pages() {
        let series = uniform_series(2500, 50);
        let req = Request {
            start: ts(0),
            end: ts(50),
            page: 1,
            ..Default::default()
        };
        let (_, info) = make_sub_query(&req, &series, 1000).unwrap();
        assert_eq!(info.total, 3);
    }

    #[test]
    fn negative_one_selects_the_last_page() {
        let series = uniform_series(2500, 50);
        let req = Request {
            start: ts(0),
            end: ts(50),
            page: -1,
            ..Default::default()
        };
        let (sub, info) = make_sub_query(&req, &series, 1000).unwrap();
        assert_eq!(info.current, 3);
        assert_eq!(sub.end, ts(50));
    }

    #[test]
    fn out_of_range_page_is_bad_request() {
        let series = uniform_series(2500, 50);
        let req = Request {
            start: ts(0),
            end: ts(50),
            page: 99,
            ..Default::default()
        };
        assert_eq!(make_sub_query(&req, &series, 1000), Err(ApiError::BadRequest));
    }

    #[test]
    fn empty_series_yields_a_single_page_spanning_the_request() {
        let req = Request {
            start: ts(0),
            end: ts(10),
            page: 1,
            ..Default::default()
        };
        let (sub, info) = make_sub_query(&req, &SeriesData::new(), 1000).unwrap();
        assert_eq!(info.total, 1);
        assert_eq!(sub.start, ts(0));
        assert_eq!(sub.end, ts(10));
    }
}
