use std::sync::Arc;

use anyhow::Result;

use crate::artifacts::sqlite::collect_from_databases;
use crate::cache::FileHandle;
use crate::context::RunContext;
use crate::models::{ArtifactOutput, SearchPattern};

pub const NAME: &str = "application_state";

const APPLICATIONS_QUERY: &str = r#"
SELECT DISTINCT application_identifier AS "Bundle ID"
FROM application_identifier_tab
ORDER BY application_identifier
"#;

pub fn patterns() -> Vec<SearchPattern> {
    vec![SearchPattern::new("**/FrontBoard/applicationState.db")]
}

pub fn process(_ctx: &RunContext, found: &[Arc<FileHandle>]) -> Result<ArtifactOutput> {
    collect_from_databases(found, APPLICATIONS_QUERY)
}
