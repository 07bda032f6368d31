pub mod error;
pub mod events;
pub mod items;
pub mod leaderboard;
pub mod models;
pub mod payload;
pub mod skills;
pub mod sprite;

pub use error::{FailureKind, ForgeError};
pub use items::{
    BaseItem, BaseStats, EvolutionConcept, FlavorText, ItemAnalysis, ItemType, Material,
    ScanMode, StatId,
};
pub use skills::{SkillCatalog, SkillCategory, SkillDefinition, SkillMatch};
pub use sprite::Sprite;
