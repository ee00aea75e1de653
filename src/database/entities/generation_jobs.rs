use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "generation_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub story_id: Option<String>,
    pub job_type: String,
    pub status: String,
    pub retry_count: i32,
    #[sea_orm(column_type = "Text", default_value = "{}")]
    pub payload: String, // JSON map carried from dispatch to handler
    #[sea_orm(column_type = "Text", nullable)]
    pub result_uri: Option<String>,
    pub failure_reason: Option<String>,
    pub started_at: Option<ChronoDateTimeUtc>,
    pub finished_at: Option<ChronoDateTimeUtc>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    StoryScript,
    Translation,
    Vocabulary,
    Image,
    Audio,
    Video,
}

impl From<JobType> for String {
    fn from(job_type: JobType) -> Self {
        job_type.as_str().to_string()
    }
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::StoryScript => "story_script",
            JobType::Translation => "translation",
            JobType::Vocabulary => "vocabulary",
            JobType::Image => "image",
            JobType::Audio => "audio",
            JobType::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "story_script" => Some(JobType::StoryScript),
            "translation" => Some(JobType::Translation),
            "vocabulary" => Some(JobType::Vocabulary),
            "image" => Some(JobType::Image),
            "audio" => Some(JobType::Audio),
            "video" => Some(JobType::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => "pending".to_string(),
            JobStatus::Processing => "processing".to_string(),
            JobStatus::Completed => "completed".to_string(),
            JobStatus::Failed => "failed".to_string(),
        }
    }
}

impl From<String> for JobStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

impl Model {
    pub fn get_status(&self) -> JobStatus {
        JobStatus::from(self.status.clone())
    }

    pub fn payload_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.payload).unwrap_or_else(|_| serde_json::json!({}))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.get_status(), JobStatus::Pending)
    }
}
