use std::sync::Arc;

use anyhow::Result;

use crate::artifacts::sqlite::collect_from_databases;
use crate::cache::FileHandle;
use crate::context::RunContext;
use crate::models::{ArtifactOutput, SearchPattern};

pub const NAME: &str = "sms_messages";

// Message dates are nanoseconds since 2001-01-01 on newer devices and
// seconds on older ones.
const MESSAGES_QUERY: &str = r#"
SELECT
    datetime(
        CASE WHEN message.date > 1000000000000 THEN message.date / 1000000000 ELSE message.date END + 978307200,
        'unixepoch'
    ) AS "Message Date",
    handle.id AS "Contact",
    CASE message.is_from_me WHEN 1 THEN 'Sent' ELSE 'Received' END AS "Direction",
    message.text AS "Text",
    message.service AS "Service"
FROM message
LEFT JOIN handle ON message.handle_id = handle.ROWID
ORDER BY message.date
"#;

pub fn patterns() -> Vec<SearchPattern> {
    vec![SearchPattern::new("**/Library/SMS/sms.db")]
}

pub fn process(_ctx: &RunContext, found: &[Arc<FileHandle>]) -> Result<ArtifactOutput> {
    collect_from_databases(found, MESSAGES_QUERY)
}
