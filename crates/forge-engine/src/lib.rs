pub mod config;
pub mod normalize;
pub mod pipeline;
pub mod providers;
pub mod recovery;
pub mod stages;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::ForgeConfig;
pub use normalize::normalize;
pub use pipeline::{EvolveResponse, ForgePipeline, ImageResponse, ScanResponse};
pub use providers::{ImageInput, SynthesizerRegistry};
pub use recovery::{parse_json_object, recover};
pub use stages::StageOutcome;
