use std::sync::Arc;

use anyhow::Result;

use crate::artifacts::sqlite::collect_from_databases;
use crate::cache::FileHandle;
use crate::context::RunContext;
use crate::models::{ArtifactOutput, SearchPattern};

pub const NAME: &str = "safari_history";

const HISTORY_QUERY: &str = r#"
SELECT
    datetime(history_visits.visit_time + 978307200, 'unixepoch') AS "Visit Time",
    history_items.url AS "URL",
    history_visits.title AS "Title",
    history_items.visit_count AS "Visit Count"
FROM history_visits
JOIN history_items ON history_visits.history_item = history_items.id
ORDER BY history_visits.visit_time
"#;

pub fn patterns() -> Vec<SearchPattern> {
    vec![SearchPattern::new("**/Safari/History.db")]
}

pub fn process(_ctx: &RunContext, found: &[Arc<FileHandle>]) -> Result<ArtifactOutput> {
    collect_from_databases(found, HISTORY_QUERY)
}
