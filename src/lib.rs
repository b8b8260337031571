//! Client transaction feature extraction.
//!
//! Current implemented scope:
//! - salted-hash client partitioning for reproducible train/validation splits
//! - fixed-length global feature vectors (dates, amounts, categories)
//! - fixed-length date-aligned `(small_group, amount)` sequences
//! - CSV table loading and array persistence

mod config;
mod dataset;
mod dates;
mod features;
mod groups;
mod money;
mod observability;
mod split;
mod stats;
mod timeseries;

pub use config::{
    data_source_config_from_env, AggLevel, ConfigError, DataSourceConfig, ExtractionConfig,
    SplitConfig, DEFAULT_NUM_BINS, DEFAULT_TRAIN_BINS, IMPORTANT_GROUPS, NULL_GROUP_ID,
    OUTLIER_THRESHOLDS, SEQ_LENGTH, VALIDATION_SALT,
};
pub use dataset::{
    load_matrix, load_targets, load_transactions, read_targets, read_transactions, write_matrix,
    ClientIndex, DataSource, DatasetError, FeatureMatrix, TargetRow, Transaction,
};
pub use dates::{
    date_feature_names, date_features, day_of_week, month, quarter, DateCycle, DATE_CYCLES,
};
pub use features::{
    assert_schema_compatible, build_feature_schema, schema_path_for, FeatureColumn, FeatureDType,
    FeatureError, FeatureSchema, GlobalFeatureExtractor, FEATURE_SCHEMA_VERSION,
};
pub use groups::{group_feature_names, group_features, rank_important_groups};
pub use money::{
    cycle_summaries, level_aggregates, money_feature_names, money_features, outlier_features,
};
pub use observability::{
    filter_directive, init_logging, log_run_start, logging_config_from_env, LogFormat,
    LoggingConfig, LoggingInitError,
};
pub use split::{
    client_bucket, client_id_bins, client_id_hash, hash_bin, validation_split, ClientBin,
    DatasetSplit, SplitError,
};
pub use stats::{
    describe, nan_to_num, HighLevelStat, DESCRIBE_LABELS, DESCRIBE_WIDTH, HIGH_LEVEL_STATS,
};
pub use timeseries::{TimeSeries, TimeSeriesBatch, TimeSeriesExtractor, TimeSeriesPaths};
