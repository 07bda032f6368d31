use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::payload::first_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillCategory {
    Deal,
    Buff,
}

impl SkillCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deal => "deal",
            Self::Buff => "buff",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "deal" | "damage" | "attack" | "offense" => Some(Self::Deal),
            "buff" | "support" | "heal" | "defense" => Some(Self::Buff),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillMatch {
    pub skill_name: String,
    pub category: SkillCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillDefinition {
    /// Client asset key; effects and sounds are looked up by this name.
    pub name: &'static str,
    pub materials: &'static [&'static str],
    pub attributes: &'static [&'static str],
    pub category: SkillCategory,
}

const DEFAULT_SKILL_NAME: &str = "combodefault";

static SKILLS: &[SkillDefinition] = &[
    SkillDefinition {
        name: "astralblitz",
        materials: &["crystal", "glass", "gemstone"],
        attributes: &["cosmic", "light", "swift"],
        category: SkillCategory::Deal,
    },
    SkillDefinition {
        name: "durandal",
        materials: &["metal", "steel", "iron"],
        attributes: &["holy", "sharp", "unbreakable"],
        category: SkillCategory::Deal,
    },
    SkillDefinition {
        name: "groundzero",
        materials: &["stone", "concrete", "ceramic"],
        attributes: &["earth", "heavy", "explosive"],
        category: SkillCategory::Deal,
    },
    SkillDefinition {
        name: "shadower",
        materials: &["leather", "rubber", "fabric"],
        attributes: &["dark", "stealth", "evasive"],
        category: SkillCategory::Buff,
    },
    SkillDefinition {
        name: "supercannonexplosion",
        materials: &["battery", "electronics", "plastic"],
        attributes: &["fire", "explosive", "energy"],
        category: SkillCategory::Deal,
    },
    SkillDefinition {
        name: "ren",
        materials: &["wood", "plant", "paper"],
        attributes: &["nature", "calm", "healing"],
        category: SkillCategory::Buff,
    },
    SkillDefinition {
        name: "cataclysm",
        materials: &["liquid", "ice", "glass"],
        attributes: &["water", "cold", "chaos"],
        category: SkillCategory::Deal,
    },
    SkillDefinition {
        name: "spiritcalibur",
        materials: &["gold", "silver", "metal"],
        attributes: &["spirit", "radiant", "protective"],
        category: SkillCategory::Buff,
    },
    SkillDefinition {
        name: "souleclipse",
        materials: &["obsidian", "rubber", "liquid"],
        attributes: &["void", "dark", "curse"],
        category: SkillCategory::Deal,
    },
    SkillDefinition {
        name: "combodefault",
        materials: &["fabric", "plastic", "metal"],
        attributes: &["physical", "blunt", "quick"],
        category: SkillCategory::Deal,
    },
];

/// Static reference table the skill-matching stage selects from.
#[derive(Debug, Clone, Copy)]
pub struct SkillCatalog {
    entries: &'static [SkillDefinition],
    default_name: &'static str,
}

impl Default for SkillCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SkillCatalog {
    pub fn builtin() -> Self {
        Self {
            entries: SKILLS,
            default_name: DEFAULT_SKILL_NAME,
        }
    }

    pub fn entries(&self) -> &'static [SkillDefinition] {
        self.entries
    }

    pub fn default_entry(&self) -> Option<&'static SkillDefinition> {
        self.get(self.default_name)
    }

    /// Lookup ignoring case, spaces and punctuation, so "Astral Blitz"
    /// finds `astralblitz`.
    pub fn get(&self, name: &str) -> Option<&'static SkillDefinition> {
        let needle = skill_key(name);
        self.entries.iter().find(|entry| skill_key(entry.name) == needle)
    }

    pub fn fallback_match(&self) -> SkillMatch {
        SkillMatch {
            skill_name: self.default_name.to_string(),
            category: SkillCategory::Deal,
        }
    }

    /// One `name | materials | attributes | category` row per entry, with
    /// a header.
    pub fn as_prompt_table(&self) -> String {
        let mut lines = vec!["name | materials | attributes | category".to_string()];
        for entry in self.entries {
            lines.push(format!(
                "{} | {} | {} | {}",
                entry.name,
                entry.materials.join(", "),
                entry.attributes.join(", "),
                entry.category.as_str()
            ));
        }
        lines.join("\n")
    }

    /// Reads a provider payload and pins the chosen name to a catalog entry.
    /// The entry's own category wins over whatever the model claimed.
    ///
    /// Returns `None` when the payload names no skill or names one outside
    /// the catalog; callers fall back to [`SkillCatalog::fallback_match`].
    pub fn resolve_payload(&self, payload: &Map<String, Value>) -> Option<SkillMatch> {
        let requested = first_text(payload, &["skillName", "skill_name", "skill", "name"])?;
        let entry = self.get(&requested)?;
        Some(SkillMatch {
            skill_name: entry.name.to_string(),
            category: entry.category,
        })
    }
}

fn skill_key(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn builtin_catalog_has_unique_names_and_a_default() {
        let catalog = SkillCatalog::builtin();
        let mut names: Vec<&str> = catalog.entries().iter().map(|entry| entry.name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(catalog.default_entry().is_some());
        assert_eq!(catalog.fallback_match().category, SkillCategory::Deal);
    }

    #[test]
    fn resolve_payload_canonicalizes_spelling_and_uses_entry_category() {
        let catalog = SkillCatalog::builtin();
        let resolved = catalog
            .resolve_payload(&object(json!({"skill_name": "  Spirit Calibur ", "category": "deal"})));
        assert_eq!(
            resolved,
            Some(SkillMatch {
                skill_name: "spiritcalibur".to_string(),
                category: SkillCategory::Buff,
            })
        );
        assert_eq!(
            catalog
                .resolve_payload(&object(json!({"skillName": "SUPER-CANNON explosion"})))
                .map(|matched| matched.skill_name),
            Some("supercannonexplosion".to_string())
        );
    }

    #[test]
    fn resolve_payload_rejects_names_outside_catalog() {
        let catalog = SkillCatalog::builtin();
        assert!(catalog
            .resolve_payload(&object(json!({"skillName": "Meteor Swarm", "category": "deal"})))
            .is_none());
        assert!(catalog.resolve_payload(&Map::new()).is_none());
    }

    #[test]
    fn catalog_carries_client_skill_keys_with_both_categories() {
        let catalog = SkillCatalog::builtin();
        let names: Vec<&str> = catalog.entries().iter().map(|entry| entry.name).collect();
        assert_eq!(
            names,
            vec![
                "astralblitz",
                "durandal",
                "groundzero",
                "shadower",
                "supercannonexplosion",
                "ren",
                "cataclysm",
                "spiritcalibur",
                "souleclipse",
                "combodefault",
            ]
        );
        assert!(catalog.entries().iter().any(|entry| entry.category == SkillCategory::Buff));
        assert_eq!(catalog.fallback_match().skill_name, "combodefault");
        assert_eq!(
            catalog.default_entry().map(|entry| entry.category),
            Some(SkillCategory::Deal)
        );
    }

    #[test]
    fn prompt_table_lists_every_entry() {
        let catalog = SkillCatalog::builtin();
        let table = catalog.as_prompt_table();
        assert_eq!(table.lines().count(), catalog.entries().len() + 1);
        assert!(table.contains("durandal | metal, steel, iron | holy, sharp, unbreakable | deal"));
    }
}
