use std::sync::Arc;

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;

use crate::cache::FileHandle;
use crate::context::RunContext;
use crate::models::{ArtifactOutput, SearchPattern};

pub const NAME: &str = "device_info";

/// Keys published into the run's device metadata
pub const VERSION_KEYS: [&str; 3] = ["ProductName", "ProductVersion", "ProductBuildVersion"];

lazy_static! {
    /// `<key>Name</key><string>value</string>` pairs in an XML property list
    static ref PLIST_STRING: Regex =
        Regex::new(r"<key>\s*([A-Za-z]+)\s*</key>\s*<string>([^<]*)</string>").unwrap();
}

pub fn patterns() -> Vec<SearchPattern> {
    vec![SearchPattern::new("**/System/Library/CoreServices/SystemVersion.plist").first_hit()]
}

/// Read the OS version keys from `SystemVersion.plist` and publish them
pub fn process(ctx: &RunContext, found: &[Arc<FileHandle>]) -> Result<ArtifactOutput> {
    let mut rows = Vec::new();

    for handle in found {
        let bytes = handle.read_all()
            .with_context(|| format!("Failed to read {}", handle.path().display()))?;
        let text = String::from_utf8_lossy(&bytes);

        for (key, value) in parse_version_keys(&text) {
            ctx.device().set(&key, &value);
            rows.push(vec![json!(key), json!(value)]);
        }
    }

    if rows.is_empty() {
        bail!("No version keys found in SystemVersion.plist");
    }

    Ok(ArtifactOutput::new(vec!["Property".to_string(), "Value".to_string()], rows))
}

/// Version key/value pairs from an XML property list
fn parse_version_keys(text: &str) -> Vec<(String, String)> {
    PLIST_STRING
        .captures_iter(text)
        .filter(|caps| VERSION_KEYS.contains(&&caps[1]))
        .map(|caps| (caps[1].to_string(), caps[2].trim().to_string()))
        .collect()
}
