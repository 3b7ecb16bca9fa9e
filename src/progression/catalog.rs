//! Shard shop tables: permanent upgrades and marble skins

use std::sync::LazyLock;

pub const PERM_INCOME: &str = "perm_income_a";
pub const PERM_SHARD_MULTI: &str = "perm_shard_multi";
pub const PERM_MICRO_BOOST: &str = "perm_micro_boost";
pub const PERM_BONUS_CHANCE: &str = "perm_bonus_chance";

/// Each purchase multiplies the stored shard price by this
pub const PERM_COST_GROWTH: f64 = 1.4;

/// Skin every save starts with
pub const STARTER_SKIN: &str = "tie_dye_1";

/// A permanent upgrade bought with kinetic shards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermUpgradeConfig {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub base_cost: u64,
    /// `None` means the line never caps
    pub max_level: Option<u32>,
}

pub static PERM_UPGRADES: [PermUpgradeConfig; 4] = [
    PermUpgradeConfig {
        id: PERM_INCOME,
        name: "Permanent Income Boost",
        description: "Increases all base income by 5%",
        base_cost: 3,
        max_level: None,
    },
    PermUpgradeConfig {
        id: PERM_SHARD_MULTI,
        name: "Shard Multiplier",
        description: "Increases Shard gain from Prestiging by 10%",
        base_cost: 5,
        max_level: None,
    },
    PermUpgradeConfig {
        id: PERM_MICRO_BOOST,
        name: "Micro Marble Boost",
        description: "Increases the base value of Micro Marbles by 2%",
        base_cost: 7,
        max_level: None,
    },
    PermUpgradeConfig {
        id: PERM_BONUS_CHANCE,
        name: "Bonus Chance Boost",
        description: "Increases chance for a Bonus Marble to appear by 1%",
        base_cost: 10,
        max_level: Some(50),
    },
];

pub fn find_perm_upgrade(id: &str) -> Option<&'static PermUpgradeConfig> {
    PERM_UPGRADES.iter().find(|cfg| cfg.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkinRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// A cosmetic marble skin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarbleSkin {
    pub id: String,
    pub name: String,
    pub rarity: SkinRarity,
    /// Shard price before the ownership markup
    pub cost: u64,
    /// Texture file handed to the renderer, if any
    pub texture: Option<&'static str>,
}

impl MarbleSkin {
    /// Shard price given how many skins are already owned
    pub fn price(&self, owned_count: usize) -> u64 {
        (self.cost as f64 * (1.0 + owned_count as f64 * 0.25)).round() as u64
    }
}

const COMMON_TEXTURES: [&str; 23] = [
    "Bubbles.png", "Bricks.png", "Camo.png", "Scales.png", "Cucumber.png", "Chocolate.png",
    "Fish.png", "Jack-o-Lantern.png", "Metal.png", "Sand.png", "Boulder.png", "PolkaDot.png",
    "Cookie.png", "Water.png", "Fire.png", "Crate.png", "Rug.png", "Leaves.png",
    "Honeycomb.png", "Mountain.png", "Mushroom.png", "Watermelon.png", "Tiles.png",
];
const RARE_TEXTURES: [&str; 15] = [
    "Leopard.png", "Music.png", "Magma.png", "Strawberry.png", "Biohazard.png",
    "ValentinesChoco.png", "Bomb.png", "Warning.png", "Target.png", "BubbleGum.png",
    "Earth.png", "Vinyl.png", "Zirconium.png", "Coin.png", "Glazed.png",
];
const EPIC_TEXTURES: [&str; 5] = ["TP.png", "Skull.png", "Sapphire.png", "Ruby.png", "Emerald.png"];
const LEGENDARY_TEXTURES: [&str; 4] = ["Nebula.png", "Granite.png", "YinYang.png", "Diamond.png"];

const SKIN_COUNT: usize = 50;

/// "Jack-o-Lantern.png" -> "Jack o Lantern"
fn display_name(texture: &str) -> String {
    texture
        .trim_end_matches(".png")
        .replace(['-', '_'], " ")
}

fn build_skins() -> Vec<MarbleSkin> {
    let mut skins = Vec::with_capacity(SKIN_COUNT);
    skins.push(MarbleSkin {
        id: STARTER_SKIN.to_string(),
        name: "Tie-dye".to_string(),
        rarity: SkinRarity::Legendary,
        cost: 0,
        texture: None,
    });

    for i in 2..=SKIN_COUNT {
        let (rarity, cost, texture, name) = match i {
            2 => (SkinRarity::Common, 2, "Wooden.png", Some("Wooden")),
            3 => (SkinRarity::Common, 2, "Stone.png", Some("Stone")),
            4..=26 => (
                SkinRarity::Common,
                2,
                COMMON_TEXTURES[(i - 1) % COMMON_TEXTURES.len()],
                None,
            ),
            27..=41 => (SkinRarity::Rare, 5, RARE_TEXTURES[(i - 27) % RARE_TEXTURES.len()], None),
            42..=46 => (SkinRarity::Epic, 10, EPIC_TEXTURES[(i - 42) % EPIC_TEXTURES.len()], None),
            _ => (
                SkinRarity::Legendary,
                25,
                LEGENDARY_TEXTURES[(i - 47) % LEGENDARY_TEXTURES.len()],
                None,
            ),
        };

        skins.push(MarbleSkin {
            id: format!("marble_{i}"),
            name: name.map_or_else(|| display_name(texture), str::to_string),
            rarity,
            cost,
            texture: Some(texture),
        });
    }
    skins
}

pub static MARBLE_SKINS: LazyLock<Vec<MarbleSkin>> = LazyLock::new(build_skins);

pub fn find_skin(id: &str) -> Option<&'static MarbleSkin> {
    MARBLE_SKINS.iter().find(|skin| skin.id == id)
}
