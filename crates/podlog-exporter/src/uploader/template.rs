//! Minimal renderer for the S3 destination's `path_template`:
//! `{{.Pod}}`, `{{.Container}}`, `{{.Namespace}}`, `{{.SinkName}}`,
//! `{{.RuleName}}`, `{{.SourceType}}`, `{{.SourcePath}}`, and
//! `{{TimeLayout "fmt"}}`. Not a general template engine — just this
//! fixed token set, via one compiled regex shared across calls.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use podlog_model::Chunk;
use regex::Regex;

use crate::golayout::format_go_layout;

pub struct PathContext<'a> {
    pub chunk: &'a Chunk,
    pub sink_namespace: &'a str,
    pub sink_name: &'a str,
    pub rule_name: &'a str,
    pub date: DateTime<Utc>,
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\{\{\s*(\.\w+|TimeLayout\s+"[^"]*")\s*\}\}"#).unwrap())
}

pub fn render(template: &str, ctx: &PathContext) -> String {
    token_re()
        .replace_all(template, |caps: &regex::Captures| {
            let token = caps[1].trim();
            match token {
                ".Pod" => ctx.chunk.pod.clone(),
                ".Container" => ctx.chunk.container.clone(),
                ".Namespace" => ctx.chunk.namespace.clone(),
                ".SinkName" => ctx.sink_name.to_string(),
                ".RuleName" => ctx.rule_name.to_string(),
                ".SourceType" => ctx.chunk.source.source_type.clone(),
                ".SourcePath" => ctx.chunk.source.path.clone(),
                other if other.starts_with("TimeLayout") => {
                    let layout = other.trim_start_matches("TimeLayout").trim().trim_matches('"');
                    format_go_layout(layout, ctx.date)
                }
                _ => String::new(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use podlog_model::{Labels, Source};
    use std::collections::BTreeMap;

    fn sample_chunk() -> Chunk {
        Chunk {
            id: "id".into(),
            cluster: "local".into(),
            namespace: "ns".into(),
            labels: Labels(BTreeMap::new()),
            set_name: "web".into(),
            pod: "web-0".into(),
            pod_uid: "uid".into(),
            container: "app".into(),
            source: Source::std_stream(),
            blocks: Vec::new(),
            temp_block: Default::default(),
            started_at: Default::default(),
            updated_at: Default::default(),
            deletion_mark: false,
            deletion_mark_in_block: false,
            line: 0,
            size: 0,
            check_point: None,
            store_addr: String::new(),
            relative_pod_dir: String::new(),
            relative_block_dir: String::new(),
        }
    }

    #[test]
    fn renders_identity_tokens() {
        let chunk = sample_chunk();
        let ctx = PathContext {
            chunk: &chunk,
            sink_namespace: "ops",
            sink_name: "logs",
            rule_name: "all",
            date: Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap(),
        };
        let out = render("/exports/{{.Namespace}}/{{.SinkName}}/{{.RuleName}}/{{.Pod}}/{{.Container}}", &ctx);
        assert_eq!(out, "/exports/ns/ops/logs/all/web-0/app");
    }

    #[test]
    fn renders_time_layout_token() {
        let chunk = sample_chunk();
        let ctx = PathContext {
            chunk: &chunk,
            sink_namespace: "ops",
            sink_name: "logs",
            rule_name: "all",
            date: Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap(),
        };
        let out = render(r#"/exports/{{TimeLayout "2006-01"}}/{{.Pod}}"#, &ctx);
        assert_eq!(out, "/exports/2024-03/web-0");
    }
}
