//! Built-in artifact plugins and the registry that lists them.

use anyhow::Result;

use crate::engine::{ArtifactDescriptor, ArtifactRegistry};
use crate::models::SearchPattern;

/// Shared SQLite query helpers
pub mod sqlite;

pub mod app_state;
pub mod device_info;
pub mod knowledgec;
pub mod safari_history;
pub mod sms;

fn with_patterns(mut descriptor: ArtifactDescriptor, patterns: Vec<SearchPattern>) -> ArtifactDescriptor {
    for pattern in patterns {
        descriptor = descriptor.pattern(pattern);
    }
    descriptor
}

/// Registry holding every built-in artifact, nothing selected
pub fn builtin_registry() -> Result<ArtifactRegistry> {
    let mut registry = ArtifactRegistry::new();

    registry.register(with_patterns(
        ArtifactDescriptor::new(device_info::NAME, "Device Info", device_info::process)
            .description("Operating system name, version and build")
            .core()
            .report(false),
        device_info::patterns(),
    ))?;

    registry.register(with_patterns(
        ArtifactDescriptor::new(sms::NAME, "Messages", sms::process)
            .description("SMS and iMessage history")
            .timeline(),
        sms::patterns(),
    ))?;

    registry.register(with_patterns(
        ArtifactDescriptor::new(safari_history::NAME, "Safari", safari_history::process)
            .description("Safari browsing history")
            .timeline(),
        safari_history::patterns(),
    ))?;

    registry.register(with_patterns(
        ArtifactDescriptor::new(app_state::NAME, "Installed Apps", app_state::process)
            .description("Bundle identifiers known to the application state database"),
        app_state::patterns(),
    ))?;

    registry.register(with_patterns(
        ArtifactDescriptor::new(knowledgec::NAME, "KnowledgeC", knowledgec::process)
            .description("Application usage intervals from the knowledgeC stream")
            .long_running()
            .timeline(),
        knowledgec::patterns(),
    ))?;

    Ok(registry)
}
