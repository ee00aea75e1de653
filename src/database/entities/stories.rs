use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title_en: String,
    pub title_zh: Option<String>,
    pub theme: String,
    pub status: String,
    pub age_range: Option<String>,
    #[sea_orm(column_type = "Text", default_value = "{}")]
    pub metadata: String, // JSON map; holds synopses and any original id
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::story_pages::Entity")]
    StoryPages,
    #[sea_orm(has_many = "super::vocab_entries::Entity")]
    VocabEntries,
    #[sea_orm(has_many = "super::generation_jobs::Entity")]
    GenerationJobs,
    #[sea_orm(has_many = "super::media_assets::Entity")]
    MediaAssets,
}

impl Related<super::story_pages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StoryPages.def()
    }
}

impl Related<super::vocab_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VocabEntries.def()
    }
}

impl Related<super::generation_jobs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GenerationJobs.def()
    }
}

impl Related<super::media_assets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MediaAssets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoryStatus {
    Draft,
    Scheduled,
    Processing,
    Published,
    Failed,
}

impl From<StoryStatus> for String {
    fn from(status: StoryStatus) -> Self {
        match status {
            StoryStatus::Draft => "draft".to_string(),
            StoryStatus::Scheduled => "scheduled".to_string(),
            StoryStatus::Processing => "processing".to_string(),
            StoryStatus::Published => "published".to_string(),
            StoryStatus::Failed => "failed".to_string(),
        }
    }
}

impl From<String> for StoryStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "scheduled" => StoryStatus::Scheduled,
            "processing" => StoryStatus::Processing,
            "published" => StoryStatus::Published,
            "failed" => StoryStatus::Failed,
            _ => StoryStatus::Draft,
        }
    }
}

impl Model {
    pub fn get_status(&self) -> StoryStatus {
        StoryStatus::from(self.status.clone())
    }

    pub fn metadata_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.metadata).unwrap_or_else(|_| serde_json::json!({}))
    }
}
