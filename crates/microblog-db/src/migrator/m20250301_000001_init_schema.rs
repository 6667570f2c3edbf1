//! Initial schema: custom domain record and instance settings

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================================
        // 1. Create custom_domain table
        //    `id` is pinned to 1, so the table holds at most one row
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(CustomDomain::Table)
                    .if_not_exists()
                    .col(integer(CustomDomain::Id).primary_key())
                    .col(string_len(CustomDomain::Domain, 253).unique_key())
                    .col(string_len(CustomDomain::VerificationToken, 128).not_null())
                    .col(timestamp_with_time_zone_null(CustomDomain::VerifiedAt))
                    .col(timestamp_with_time_zone_null(CustomDomain::ActivatedAt))
                    .col(timestamp_with_time_zone_null(CustomDomain::LastVerifiedAt))
                    .col(
                        integer(CustomDomain::VerificationAttempts)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        timestamp_with_time_zone(CustomDomain::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 2. Create site_settings table with its single row
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(SiteSettings::Table)
                    .if_not_exists()
                    .col(integer(SiteSettings::Id).primary_key())
                    .col(text_null(SiteSettings::InstanceHostname))
                    .col(
                        timestamp_with_time_zone(SiteSettings::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        let seed = Query::insert()
            .into_table(SiteSettings::Table)
            .columns([SiteSettings::Id])
            .values_panic([1i32.into()])
            .to_owned();
        manager.exec_stmt(seed).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SiteSettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CustomDomain::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CustomDomain {
    #[sea_orm(iden = "custom_domain")]
    Table,
    Id,
    Domain,
    VerificationToken,
    VerifiedAt,
    ActivatedAt,
    LastVerifiedAt,
    VerificationAttempts,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SiteSettings {
    #[sea_orm(iden = "site_settings")]
    Table,
    Id,
    InstanceHostname,
    UpdatedAt,
}
