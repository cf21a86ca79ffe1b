//! The fixed set of shelf categories.

use serde::{Deserialize, Serialize};

/// A shelf category.
///
/// Three categories are ranked by pairwise preference; `Tbr` is ordered by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "liked it")]
    LikedIt,

    #[serde(rename = "it was ok")]
    ItWasOk,

    #[serde(rename = "didn't like it")]
    DidntLikeIt,

    /// To be read
    #[serde(rename = "tbr")]
    Tbr,
}

impl Category {
    /// Every category, in display order
    pub const ALL: [Category; 4] = [
        Category::LikedIt,
        Category::ItWasOk,
        Category::DidntLikeIt,
        Category::Tbr,
    ];

    /// Stored/serialized name
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::LikedIt => "liked it",
            Category::ItWasOk => "it was ok",
            Category::DidntLikeIt => "didn't like it",
            Category::Tbr => "tbr",
        }
    }

    /// Whether insertion order is decided by comparisons
    pub fn is_ranked(&self) -> bool {
        !matches!(self, Category::Tbr)
    }

    /// Infer a category from an exported rating (0 = unrated).
    pub fn from_rating(rating: u8) -> Option<Self> {
        match rating {
            0 => None,
            1 | 2 => Some(Category::DidntLikeIt),
            3 => Some(Category::ItWasOk),
            _ => Some(Category::LikedIt),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "liked it" | "liked" => Ok(Category::LikedIt),
            "it was ok" | "ok" => Ok(Category::ItWasOk),
            "didn't like it" | "disliked" => Ok(Category::DidntLikeIt),
            "tbr" | "to-read" => Ok(Category::Tbr),
            _ => anyhow::bail!("Unknown category: {}", s),
        }
    }
}
