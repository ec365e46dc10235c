use std::sync::Arc;

use anyhow::Result;
use log::debug;

use crate::artifacts::sqlite::collect_from_databases;
use crate::cache::FileHandle;
use crate::context::RunContext;
use crate::models::{ArtifactOutput, SearchPattern};

pub const NAME: &str = "knowledgec_usage";

const APP_USAGE_QUERY: &str = r#"
SELECT
    datetime(ZOBJECT.ZSTARTDATE + 978307200, 'unixepoch') AS "Start",
    datetime(ZOBJECT.ZENDDATE + 978307200, 'unixepoch') AS "End",
    ZOBJECT.ZVALUESTRING AS "Bundle ID",
    CAST(ZOBJECT.ZENDDATE - ZOBJECT.ZSTARTDATE AS INTEGER) AS "Usage Seconds"
FROM ZOBJECT
WHERE ZOBJECT.ZSTREAMNAME = '/app/usage'
ORDER BY ZOBJECT.ZSTARTDATE
"#;

pub fn patterns() -> Vec<SearchPattern> {
    vec![SearchPattern::new("**/CoreDuet/Knowledge/knowledgeC.db")]
}

pub fn process(ctx: &RunContext, found: &[Arc<FileHandle>]) -> Result<ArtifactOutput> {
    if let Some(version) = ctx.device().get("ProductVersion") {
        debug!("Reading app usage stream for OS version {}", version);
    }
    collect_from_databases(found, APP_USAGE_QUERY)
}
