//! Create `topic_access` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TopicAccess::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TopicAccess::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TopicAccess::TopicId).string_len(32).not_null())
                    .col(ColumnDef::new(TopicAccess::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(TopicAccess::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_topic_access_topic")
                            .from(TopicAccess::Table, TopicAccess::TopicId)
                            .to(Topic::Table, Topic::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_topic_access_user")
                            .from(TopicAccess::Table, TopicAccess::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One grant per user per topic
        manager
            .create_index(
                Index::create()
                    .name("idx_topic_access_topic_user")
                    .table(TopicAccess::Table)
                    .col(TopicAccess::TopicId)
                    .col(TopicAccess::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_topic_access_user_id")
                    .table(TopicAccess::Table)
                    .col(TopicAccess::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TopicAccess::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TopicAccess {
    Table,
    Id,
    TopicId,
    UserId,
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
