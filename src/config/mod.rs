mod extractor_config;

pub use extractor_config::{
    ArtifactSelection,
    ExtractorConfig,
    StagingConfig,
    load_or_create_config,
};
