//! Create topic table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Topic::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Topic::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Topic::ShareCode).string_len(8).not_null())
                    .col(ColumnDef::new(Topic::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Topic::Description).text())
                    .col(ColumnDef::new(Topic::CreatorId).string_len(32).not_null())
                    .col(ColumnDef::new(Topic::Answers).json().not_null())
                    .col(
                        ColumnDef::new(Topic::IsPublic)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Topic::IsEditable)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Topic::AllowMultiSelect)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Topic::Tags).json().not_null())
                    .col(
                        ColumnDef::new(Topic::SearchTags)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Topic::VoteCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Topic::FavoriteCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Topic::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_topic_creator")
                            .from(Topic::Table, Topic::CreatorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: share_code
        manager
            .create_index(
                Index::create()
                    .name("idx_topic_share_code")
                    .table(Topic::Table)
                    .col(Topic::ShareCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_topic_creator_id")
                    .table(Topic::Table)
                    .col(Topic::CreatorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_topic_vote_count")
                    .table(Topic::Table)
                    .col(Topic::VoteCount)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_topic_created_at")
                    .table(Topic::Table)
                    .col(Topic::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Topic::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Topic {
    Table,
    Id,
    ShareCode,
    Title,
    Description,
    CreatorId,
    Answers,
    IsPublic,
    IsEditable,
    AllowMultiSelect,
    Tags,
    SearchTags,
    VoteCount,
    FavoriteCount,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
