use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::interval::Interval;

/// Partition identity of a segment within its `(interval, version)` chunk.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShardSpec {
    /// The chunk holds exactly one unpartitioned segment.
    #[default]
    None,
    /// One of `partitions` numbered shards.
    #[serde(rename_all = "camelCase")]
    Numbered { partition_num: u32, partitions: u32 },
}

impl ShardSpec {
    /// Creates a numbered shard spec, rejecting `partition_num >= partitions`.
    pub fn numbered(partition_num: u32, partitions: u32) -> CoreResult<Self> {
        if partitions == 0 || partition_num >= partitions {
            return Err(CoreError::ValidationError(format!(
                "shard index {} is out of range for {} partitions",
                partition_num, partitions
            )));
        }
        Ok(Self::Numbered {
            partition_num,
            partitions,
        })
    }

    #[must_use]
    pub fn partition_num(&self) -> u32 {
        match self {
            ShardSpec::None => 0,
            ShardSpec::Numbered { partition_num, .. } => *partition_num,
        }
    }

    /// Number of shards that make the chunk complete.
    #[must_use]
    pub fn partitions(&self) -> u32 {
        match self {
            ShardSpec::None => 1,
            ShardSpec::Numbered { partitions, .. } => *partitions,
        }
    }
}

/// Immutable descriptor of one published segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct DataSegment {
    pub data_source: String,
    pub interval: Interval,
    pub version: String,
    #[serde(default)]
    pub shard_spec: ShardSpec,
    pub size_bytes: u64,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub binary_version: u32,
}

impl DataSegment {
    #[must_use]
    pub fn new(
        data_source: impl Into<String>,
        interval: Interval,
        version: impl Into<String>,
        shard_spec: ShardSpec,
        size_bytes: u64,
    ) -> Self {
        Self {
            data_source: data_source.into(),
            interval,
            version: version.into(),
            shard_spec,
            size_bytes,
            dimensions: Vec::new(),
            metrics: Vec::new(),
            binary_version: 0,
        }
    }

    /// Checks the shard invariant `0 <= shard_index < shard_count`.
    pub fn validate(&self) -> CoreResult<()> {
        if self.data_source.is_empty() {
            return Err(CoreError::ValidationError(
                "segment data source must not be empty".to_string(),
            ));
        }
        if let ShardSpec::Numbered {
            partition_num,
            partitions,
        } = self.shard_spec
        {
            ShardSpec::numbered(partition_num, partitions)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn partition_num(&self) -> u32 {
        self.shard_spec.partition_num()
    }

    /// Stable identifier: `{ds}_{start}_{end}_{version}[_{partition}]`.
    #[must_use]
    pub fn id(&self) -> String {
        let base = format!(
            "{}_{}_{}_{}",
            self.data_source,
            self.interval
                .start()
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            self.interval
                .end()
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            self.version
        );
        match self.shard_spec {
            ShardSpec::Numbered { partition_num, .. } if partition_num > 0 => {
                format!("{}_{}", base, partition_num)
            }
            _ => base,
        }
    }
}
