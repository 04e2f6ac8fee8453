pub mod hub_config;

pub use hub_config::{
    load_hub_config, BusSettings, FeedbackSettings, HubConfig, JointEntry, SamplingSettings,
    Thresholds,
};
