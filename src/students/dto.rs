use serde::{Deserialize, Serialize};

use super::{listing::ListingView, repo_types::Track};

#[derive(Debug, Default, Deserialize)]
pub struct TrackQuery {
    #[serde(default)]
    pub track: Track,
    pub strand: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct ViewSummary {
    pub slug: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub track: Track,
}

impl From<&ListingView> for ViewSummary {
    fn from(v: &ListingView) -> Self {
        Self {
            slug: v.slug,
            title: v.title,
            description: v.description,
            track: v.scope,
        }
    }
}
