use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use shared::domain::CategoryId;

/// A demo ranking name paired with the category a scripted walk selects for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePrompt {
    pub name: String,
    pub category: CategoryId,
}

impl SamplePrompt {
    pub fn new(name: impl Into<String>, category: impl Into<CategoryId>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }
}

/// Seeds for the tutorial and autofill flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleCatalogue {
    pub prompts: Vec<SamplePrompt>,
    pub descriptions: Vec<String>,
}

impl Default for SampleCatalogue {
    fn default() -> Self {
        let prompts = [
            ("Top 20 Countries", "geography-countries"),
            ("Best Cheeses", "food-dairy-cheese"),
            ("Greatest Hip Hop Songs", "music-genres-hip_hop"),
            ("Top 10 Snacks", "food-snacks"),
            ("Favourite Horror Movies", "entertainment-movies-horror"),
            ("Best Football Clubs", "sports-football-clubs"),
            ("Must-See Landmarks", "geography-landmarks"),
            ("Top Coffee Drinks", "food-drinks-coffee"),
        ]
        .into_iter()
        .map(|(name, category)| SamplePrompt::new(name, category))
        .collect();

        let descriptions = [
            "My personal picks, argue with me in the comments",
            "Ranked after years of careful research",
            "No guilty pleasures allowed",
            "Subject to change every weekend",
            "The definitive list",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            prompts,
            descriptions,
        }
    }
}

impl SampleCatalogue {
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn choose_prompt<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&SamplePrompt> {
        self.prompts.choose(rng)
    }

    pub fn choose_description<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.descriptions.choose(rng).map(String::as_str)
    }

    /// Prompt names in catalogue order, starting from `offset` and wrapping.
    pub fn names_from(&self, offset: usize) -> Vec<String> {
        let len = self.prompts.len();
        (0..len)
            .map(|step| self.prompts[(offset + step) % len].name.clone())
            .collect()
    }
}
