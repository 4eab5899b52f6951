//! Create `topic_favorite` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TopicFavorite::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TopicFavorite::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TopicFavorite::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(TopicFavorite::TopicId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(TopicFavorite::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_topic_favorite_user")
                            .from(TopicFavorite::Table, TopicFavorite::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_topic_favorite_topic")
                            .from(TopicFavorite::Table, TopicFavorite::TopicId)
                            .to(Topic::Table, Topic::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_topic_favorite_user_topic")
                    .table(TopicFavorite::Table)
                    .col(TopicFavorite::UserId)
                    .col(TopicFavorite::TopicId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_topic_favorite_topic_id")
                    .table(TopicFavorite::Table)
                    .col(TopicFavorite::TopicId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TopicFavorite::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TopicFavorite {
    Table,
    Id,
    UserId,
    TopicId,
    CreatedAt,
}

#[derive(Iden)]
enum Topic {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
