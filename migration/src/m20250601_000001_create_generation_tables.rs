use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create stories table
        manager
            .create_table(
                Table::create()
                    .table(Stories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Stories::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Stories::TitleEn).string().not_null())
                    .col(ColumnDef::new(Stories::TitleZh).string())
                    .col(ColumnDef::new(Stories::Theme).string().not_null())
                    .col(
                        ColumnDef::new(Stories::Status)
                            .string()
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Stories::AgeRange).string())
                    .col(
                        ColumnDef::new(Stories::Metadata)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Stories::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Stories::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create story_pages table
        manager
            .create_table(
                Table::create()
                    .table(StoryPages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoryPages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StoryPages::StoryId).string().not_null())
                    .col(ColumnDef::new(StoryPages::PageNumber).integer().not_null())
                    .col(ColumnDef::new(StoryPages::TextEn).text().not_null())
                    .col(ColumnDef::new(StoryPages::TextZh).text())
                    .col(
                        ColumnDef::new(StoryPages::WordCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(StoryPages::ImageAssetId).integer())
                    .col(ColumnDef::new(StoryPages::AudioAssetId).integer())
                    .col(
                        ColumnDef::new(StoryPages::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_story_pages_story_id")
                            .from(StoryPages::Table, StoryPages::StoryId)
                            .to(Stories::Table, Stories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_story_pages_story_page")
                    .table(StoryPages::Table)
                    .col(StoryPages::StoryId)
                    .col(StoryPages::PageNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create vocab_entries table
        manager
            .create_table(
                Table::create()
                    .table(VocabEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VocabEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(VocabEntries::StoryId).string().not_null())
                    .col(ColumnDef::new(VocabEntries::Word).string().not_null())
                    .col(
                        ColumnDef::new(VocabEntries::PartOfSpeech)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VocabEntries::DefinitionEn)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VocabEntries::DefinitionZh)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VocabEntries::ExampleSentence)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VocabEntries::ExampleTranslation)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(VocabEntries::CefrLevel).string())
                    .col(
                        ColumnDef::new(VocabEntries::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vocab_entries_story_id")
                            .from(VocabEntries::Table, VocabEntries::StoryId)
                            .to(Stories::Table, Stories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create generation_jobs table
        manager
            .create_table(
                Table::create()
                    .table(GenerationJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GenerationJobs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GenerationJobs::StoryId).string())
                    .col(ColumnDef::new(GenerationJobs::JobType).string().not_null())
                    .col(
                        ColumnDef::new(GenerationJobs::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(GenerationJobs::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(GenerationJobs::Payload)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(ColumnDef::new(GenerationJobs::ResultUri).text())
                    .col(ColumnDef::new(GenerationJobs::FailureReason).string())
                    .col(ColumnDef::new(GenerationJobs::StartedAt).timestamp())
                    .col(ColumnDef::new(GenerationJobs::FinishedAt).timestamp())
                    .col(
                        ColumnDef::new(GenerationJobs::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(GenerationJobs::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_generation_jobs_story_id")
                            .from(GenerationJobs::Table, GenerationJobs::StoryId)
                            .to(Stories::Table, Stories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_generation_jobs_status")
                    .table(GenerationJobs::Table)
                    .col(GenerationJobs::Status)
                    .to_owned(),
            )
            .await?;

        // Create media_assets table
        manager
            .create_table(
                Table::create()
                    .table(MediaAssets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MediaAssets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MediaAssets::StoryId).string().not_null())
                    .col(ColumnDef::new(MediaAssets::PageId).integer())
                    .col(ColumnDef::new(MediaAssets::MediaType).string().not_null())
                    .col(ColumnDef::new(MediaAssets::Uri).text().not_null())
                    .col(ColumnDef::new(MediaAssets::Format).string().not_null())
                    .col(ColumnDef::new(MediaAssets::DurationMs).integer())
                    .col(
                        ColumnDef::new(MediaAssets::Metadata)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(MediaAssets::GeneratingJobId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MediaAssets::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_media_assets_story_id")
                            .from(MediaAssets::Table, MediaAssets::StoryId)
                            .to(Stories::Table, Stories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_media_assets_generating_job")
                    .table(MediaAssets::Table)
                    .col(MediaAssets::GeneratingJobId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create failed_jobs table
        manager
            .create_table(
                Table::create()
                    .table(FailedJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FailedJobs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FailedJobs::JobId).string())
                    .col(ColumnDef::new(FailedJobs::ErrorCode).string().not_null())
                    .col(ColumnDef::new(FailedJobs::ErrorMessage).text().not_null())
                    .col(
                        ColumnDef::new(FailedJobs::Resolved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(FailedJobs::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_failed_jobs_job_id")
                            .from(FailedJobs::Table, FailedJobs::JobId)
                            .to(GenerationJobs::Table, GenerationJobs::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Create weekly_schedule table
        manager
            .create_table(
                Table::create()
                    .table(WeeklySchedule::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WeeklySchedule::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WeeklySchedule::Weekday)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WeeklySchedule::StoryId).string())
                    .col(ColumnDef::new(WeeklySchedule::Theme).string())
                    .col(
                        ColumnDef::new(WeeklySchedule::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create audit_logs table
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditLogs::Actor).string())
                    .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                    .col(ColumnDef::new(AuditLogs::Subject).string())
                    .col(
                        ColumnDef::new(AuditLogs::Detail)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(AuditLogs::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::DisplayName).string())
                    .col(
                        ColumnDef::new(Users::Role)
                            .string()
                            .not_null()
                            .default("viewer"),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WeeklySchedule::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FailedJobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MediaAssets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GenerationJobs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VocabEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StoryPages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Stories::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Stories {
    Table,
    Id,
    TitleEn,
    TitleZh,
    Theme,
    Status,
    AgeRange,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StoryPages {
    Table,
    Id,
    StoryId,
    PageNumber,
    TextEn,
    TextZh,
    WordCount,
    ImageAssetId,
    AudioAssetId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum VocabEntries {
    Table,
    Id,
    StoryId,
    Word,
    PartOfSpeech,
    DefinitionEn,
    DefinitionZh,
    ExampleSentence,
    ExampleTranslation,
    CefrLevel,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GenerationJobs {
    Table,
    Id,
    StoryId,
    JobType,
    Status,
    RetryCount,
    Payload,
    ResultUri,
    FailureReason,
    StartedAt,
    FinishedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MediaAssets {
    Table,
    Id,
    StoryId,
    PageId,
    MediaType,
    Uri,
    Format,
    DurationMs,
    Metadata,
    GeneratingJobId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum FailedJobs {
    Table,
    Id,
    JobId,
    ErrorCode,
    ErrorMessage,
    Resolved,
    CreatedAt,
}

#[derive(DeriveIden)]
enum WeeklySchedule {
    Table,
    Id,
    Weekday,
    StoryId,
    Theme,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AuditLogs {
    Table,
    Id,
    Actor,
    Action,
    Subject,
    Detail,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    DisplayName,
    Role,
    CreatedAt,
}
