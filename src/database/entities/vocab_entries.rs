use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vocab_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub story_id: String,
    pub word: String,
    pub part_of_speech: String,
    #[sea_orm(column_type = "Text")]
    pub definition_en: String,
    #[sea_orm(column_type = "Text")]
    pub definition_zh: String,
    #[sea_orm(column_type = "Text")]
    pub example_sentence: String,
    #[sea_orm(column_type = "Text")]
    pub example_translation: String,
    pub cefr_level: Option<String>,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stories::Entity",
        from = "Column::StoryId",
        to = "super::stories::Column::Id"
    )]
    Stories,
}

impl Related<super::stories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
