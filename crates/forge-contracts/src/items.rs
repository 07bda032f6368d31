use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::payload::{first_text, first_value, value_as_f64};

pub const MIN_RARITY: u8 = 1;
pub const MAX_RARITY: u8 = 10;
pub const DEFAULT_RARITY: u8 = MIN_RARITY;
pub const STAT_CEILING: u32 = 100;

const UNKNOWN_NAME: &str = "Unknown Artifact";
const UNKNOWN_MATERIAL: &str = "Unknown";
const UNKNOWN_ATTRIBUTE: &str = "Void";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatId {
    Atk,
    Def,
    MaxHp,
    Spd,
    CritRate,
    CritDmg,
}

impl StatId {
    pub const ALL: [StatId; 6] = [
        StatId::Atk,
        StatId::Def,
        StatId::MaxHp,
        StatId::Spd,
        StatId::CritRate,
        StatId::CritDmg,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Atk => "atk",
            Self::Def => "def",
            Self::MaxHp => "maxHp",
            Self::Spd => "spd",
            Self::CritRate => "critRate",
            Self::CritDmg => "critDmg",
        }
    }

    /// Lenient parse: ignores case and separators, accepts long-form names.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "atk" | "attack" => Some(Self::Atk),
            "def" | "defense" | "defence" => Some(Self::Def),
            "maxhp" | "hp" | "health" => Some(Self::MaxHp),
            "spd" | "speed" => Some(Self::Spd),
            "critrate" | "crit" | "criticalrate" => Some(Self::CritRate),
            "critdmg" | "critdamage" | "criticaldamage" => Some(Self::CritDmg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Weapon,
    Armor,
    Skill,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Armor => "armor",
            Self::Skill => "skill",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "weapon" => Some(Self::Weapon),
            "armor" | "armour" => Some(Self::Armor),
            "skill" => Some(Self::Skill),
            _ => None,
        }
    }

    fn default_stats(self) -> [StatId; 3] {
        match self {
            Self::Weapon => [StatId::Atk, StatId::CritRate, StatId::CritDmg],
            Self::Armor => [StatId::Def, StatId::MaxHp, StatId::Spd],
            Self::Skill => [StatId::Atk, StatId::CritDmg, StatId::Spd],
        }
    }
}

/// Caller-selected scan hint. Unknown values are forwarded to the model as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    Craft,
    Materials,
    Other(String),
}

impl ScanMode {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "craft" => Self::Craft,
            "material" | "materials" | "materials_only" | "materials-only" => Self::Materials,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Craft => "craft",
            Self::Materials => "materials",
            Self::Other(value) => value.as_str(),
        }
    }

    pub fn is_materials_only(&self) -> bool {
        matches!(self, Self::Materials)
    }

    pub fn default_item_type(&self) -> ItemType {
        match self {
            Self::Craft => ItemType::Weapon,
            _ => ItemType::Skill,
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legacy `stats` block from older analysis payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    pub atk: u32,
    pub def: u32,
    pub hp: u32,
}

impl BaseStats {
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let read = |keys: &[&str]| -> u32 {
            first_value(object, keys)
                .and_then(value_as_f64)
                .map(|raw| raw.round().clamp(0.0, f64::from(STAT_CEILING)) as u32)
                .unwrap_or(0)
        };
        Some(Self {
            atk: read(&["atk", "attack"]),
            def: read(&["def", "defense"]),
            hp: read(&["hp", "maxHp", "max_hp"]),
        })
    }

    /// Non-zero stats, strongest first. Ties keep atk, def, hp order.
    fn ranked(&self) -> Vec<StatId> {
        let mut rows = vec![
            (StatId::Atk, self.atk),
            (StatId::Def, self.def),
            (StatId::MaxHp, self.hp),
        ];
        rows.sort_by(|left, right| right.1.cmp(&left.1));
        rows.into_iter()
            .filter(|(_, value)| *value > 0)
            .map(|(stat, _)| stat)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAnalysis {
    pub name: String,
    pub description: String,
    pub material: String,
    pub attribute: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub rarity_score: u8,
    pub affected_stats: [StatId; 3],
    pub stats: BaseStats,
}

impl ItemAnalysis {
    /// The "unidentified artifact" record returned when analysis fails.
    pub fn fallback(mode: &ScanMode) -> Self {
        let item_type = mode.default_item_type();
        let stats = BaseStats {
            atk: 10,
            def: 0,
            hp: 0,
        };
        Self {
            name: UNKNOWN_NAME.to_string(),
            description: "An unidentified artifact humming with void energy.".to_string(),
            material: UNKNOWN_MATERIAL.to_string(),
            attribute: UNKNOWN_ATTRIBUTE.to_string(),
            item_type,
            rarity_score: DEFAULT_RARITY,
            affected_stats: fill_affected_stats(&[], &stats, item_type),
            stats,
        }
    }

    /// Maps any historical analysis payload onto the canonical shape.
    ///
    /// Never fails: fields that are missing or corrupt take the value the
    /// fallback record would have used.
    pub fn from_payload(payload: &Map<String, Value>, mode: &ScanMode) -> Self {
        let name = first_text(payload, &["name", "item", "item_name"])
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        let material =
            first_text(payload, &["material"]).unwrap_or_else(|| UNKNOWN_MATERIAL.to_string());
        let attribute = first_text(payload, &["attribute", "element"])
            .unwrap_or_else(|| UNKNOWN_ATTRIBUTE.to_string());
        let item_type = first_value(payload, &["type", "item_type", "category"])
            .and_then(Value::as_str)
            .and_then(ItemType::parse)
            .unwrap_or_else(|| mode.default_item_type());
        let description = first_text(payload, &["description", "desc", "flavor"])
            .unwrap_or_else(|| format!("A {name} of {material}, attuned to {attribute}."));
        let rarity_score = first_value(payload, &["rarityScore", "rarity_score", "rarity"])
            .and_then(parse_rarity)
            .unwrap_or(DEFAULT_RARITY);

        let stats = payload
            .get("stats")
            .and_then(BaseStats::from_value)
            .unwrap_or_default();
        let explicit = first_value(payload, &["affectedStats", "affected_stats"])
            .or_else(|| payload.get("stats").filter(|value| value.is_array()))
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(Value::as_str)
                    .filter_map(StatId::parse)
                    .collect::<Vec<StatId>>()
            })
            .unwrap_or_default();

        Self {
            affected_stats: fill_affected_stats(&explicit, &stats, item_type),
            name,
            description,
            material,
            attribute,
            item_type,
            rarity_score,
            stats,
        }
    }
}

fn parse_rarity(value: &Value) -> Option<u8> {
    if let Some(raw) = value_as_f64(value) {
        let clamped = raw.round().clamp(f64::from(MIN_RARITY), f64::from(MAX_RARITY));
        return Some(clamped as u8);
    }
    let grade = value.as_str()?.trim().to_ascii_lowercase();
    match grade.as_str() {
        "common" => Some(2),
        "uncommon" => Some(4),
        "rare" => Some(6),
        "epic" => Some(8),
        "legendary" | "mythic" => Some(MAX_RARITY),
        _ => None,
    }
}

/// Exactly three distinct stats: explicit picks, then the legacy stat block,
/// then the item type's defaults, then enum order.
fn fill_affected_stats(preferred: &[StatId], stats: &BaseStats, item_type: ItemType) -> [StatId; 3] {
    let mut picked: Vec<StatId> = Vec::with_capacity(3);
    let candidates = preferred
        .iter()
        .copied()
        .chain(stats.ranked())
        .chain(item_type.default_stats())
        .chain(StatId::ALL);
    for stat in candidates {
        if picked.len() == 3 {
            break;
        }
        if !picked.contains(&stat) {
            picked.push(stat);
        }
    }
    [picked[0], picked[1], picked[2]]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorText {
    pub name: String,
    pub description: String,
}

impl FlavorText {
    /// Reads a flavor payload from the separate text stage.
    pub fn from_payload(payload: &Map<String, Value>, fallback_name: &str) -> Self {
        Self {
            name: first_text(payload, &["name", "item_name", "title"])
                .unwrap_or_else(|| fallback_name.to_string()),
            description: first_text(payload, &["description", "desc", "flavor", "lore"])
                .unwrap_or_default(),
        }
    }
}

/// Consolidated mode: the analysis already carries its own name and lore.
impl From<&ItemAnalysis> for FlavorText {
    fn from(analysis: &ItemAnalysis) -> Self {
        Self {
            name: analysis.name.clone(),
            description: analysis.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    #[serde(default = "default_grade")]
    pub grade: String,
}

fn default_grade() -> String {
    "common".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionConcept {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_prompt: Option<String>,
}

impl EvolutionConcept {
    /// Placeholder that still gives image synthesis something to render.
    pub fn fallback(base: &BaseItem) -> Self {
        Self {
            name: format!("Evolved {}", base.name),
            description: "The item has evolved, absorbing new power.".to_string(),
            visual_prompt: Some(format!(
                "{}, evolved form radiating newly absorbed power",
                base.name
            )),
        }
    }

    pub fn from_payload(payload: &Map<String, Value>, base: &BaseItem) -> Self {
        let fallback = Self::fallback(base);
        Self {
            name: first_text(payload, &["name", "new_name", "evolved_name"])
                .unwrap_or(fallback.name),
            description: first_text(payload, &["description", "desc"])
                .unwrap_or(fallback.description),
            visual_prompt: first_text(
                payload,
                &["visualPrompt", "visual_prompt", "image_prompt"],
            ),
        }
    }
}
