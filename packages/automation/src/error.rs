use thiserror::Error;

/// A stored flow block that cannot be decoded into a typed `BlockKind`.
///
/// Raised at the store boundary when flow rows are loaded, so a misauthored
/// block surfaces before execution starts rather than mid-pipeline.
#[derive(Debug, Error)]
pub enum BlockDecodeError {
    #[error("block `{block_id}` has unknown type `{block_type}`")]
    UnknownType { block_id: String, block_type: String },

    #[error("block `{block_id}` ({block_type}) has invalid config: {source}")]
    InvalidConfig {
        block_id: String,
        block_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A trigger condition string that is not of the form `field=value`.
#[derive(Debug, Error)]
#[error("trigger condition `{raw}` is not of the form `field=value`")]
pub struct TriggerParseError {
    pub raw: String,
}
