//! Create `pending_registration` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PendingRegistration::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PendingRegistration::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PendingRegistration::Username)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingRegistration::Email)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingRegistration::PasswordHash)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingRegistration::Token)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingRegistration::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingRegistration::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pending_registration_token")
                    .table(PendingRegistration::Table)
                    .col(PendingRegistration::Token)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pending_registration_email")
                    .table(PendingRegistration::Table)
                    .col(PendingRegistration::Email)
                    .to_owned(),
            )
            .await?;

        // Sweep of expired rows
        manager
            .create_index(
                Index::create()
                    .name("idx_pending_registration_expires_at")
                    .table(PendingRegistration::Table)
                    .col(PendingRegistration::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PendingRegistration::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PendingRegistration {
    Table,
    Id,
    Username,
    Email,
    PasswordHash,
    Token,
    ExpiresAt,
    CreatedAt,
}
