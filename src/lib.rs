pub mod analysis;
pub mod config;
pub mod load;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod table;
