use async_trait::async_trait;
use chrono::{DateTime, Utc};
use microblog_db::entities::{custom_domain, site_settings};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use tracing::debug;

use super::{CustomDomainRecord, DomainStore, StoreError};

/// [`DomainStore`] persisted through sea-orm
#[derive(Clone)]
pub struct SeaOrmDomainStore {
    db: DatabaseConnection,
}

impl SeaOrmDomainStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn set_column(
        &self,
        domain: &str,
        column: custom_domain::Column,
        value: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        custom_domain::Entity::update_many()
            .col_expr(column, Expr::value(value))
            .filter(custom_domain::Column::Domain.eq(domain))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

fn conflict_on_unique(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Conflict,
        _ => StoreError::Database(err),
    }
}

impl From<custom_domain::Model> for CustomDomainRecord {
    fn from(model: custom_domain::Model) -> Self {
        Self {
            domain: model.domain,
            verification_token: model.verification_token,
            verified_at: model.verified_at,
            activated_at: model.activated_at,
            last_verified_at: model.last_verified_at,
            verification_attempts: model.verification_attempts.max(0) as u32,
            created_at: model.created_at,
        }
    }
}

#[async_trait]
impl DomainStore for SeaOrmDomainStore {
    async fn get(&self) -> Result<Option<CustomDomainRecord>, StoreError> {
        let model = custom_domain::Entity::find().one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn insert(&self, domain: &str, token: &str) -> Result<CustomDomainRecord, StoreError> {
        if custom_domain::Entity::find().one(&self.db).await?.is_some() {
            return Err(StoreError::Conflict);
        }

        let record = custom_domain::ActiveModel {
            id: Set(custom_domain::RECORD_ID),
            domain: Set(domain.to_string()),
            verification_token: Set(token.to_string()),
            verified_at: Set(None),
            activated_at: Set(None),
            last_verified_at: Set(None),
            verification_attempts: Set(0),
            created_at: Set(Utc::now()),
        };
        // A concurrent insert that passed the check above loses on the primary key
        let model = record.insert(&self.db).await.map_err(conflict_on_unique)?;
        debug!("Stored custom domain {}", model.domain);
        Ok(model.into())
    }

    async fn increment_attempts(&self, domain: &str) -> Result<(), StoreError> {
        custom_domain::Entity::update_many()
            .col_expr(
                custom_domain::Column::VerificationAttempts,
                Expr::col(custom_domain::Column::VerificationAttempts).add(1),
            )
            .filter(custom_domain::Column::Domain.eq(domain))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn mark_verified(&self, domain: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.set_column(domain, custom_domain::Column::VerifiedAt, Some(at))
            .await
    }

    async fn mark_activated(&self, domain: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        custom_domain::Entity::update_many()
            .col_expr(custom_domain::Column::ActivatedAt, Expr::value(Some(at)))
            .col_expr(custom_domain::Column::LastVerifiedAt, Expr::value(Some(at)))
            .filter(custom_domain::Column::Domain.eq(domain))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn touch_last_verified(&self, domain: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.set_column(domain, custom_domain::Column::LastVerifiedAt, Some(at))
            .await
    }

    async fn clear_activation(&self, domain: &str) -> Result<(), StoreError> {
        self.set_column(domain, custom_domain::Column::ActivatedAt, None)
            .await
    }

    async fn delete(&self, domain: &str) -> Result<(), StoreError> {
        custom_domain::Entity::delete_many()
            .filter(custom_domain::Column::Domain.eq(domain))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn instance_hostname(&self) -> Result<Option<String>, StoreError> {
        let settings = site_settings::Entity::find_by_id(site_settings::SETTINGS_ROW_ID)
            .one(&self.db)
            .await?;
        Ok(settings
            .and_then(|s| s.instance_hostname)
            .filter(|h| !h.is_empty()))
    }

    async fn set_instance_hostname(&self, hostname: &str) -> Result<(), StoreError> {
        let result = site_settings::Entity::update_many()
            .col_expr(
                site_settings::Column::InstanceHostname,
                Expr::value(hostname.to_string()),
            )
            .col_expr(site_settings::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(site_settings::Column::Id.eq(site_settings::SETTINGS_ROW_ID))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            let settings = site_settings::ActiveModel {
                id: Set(site_settings::SETTINGS_ROW_ID),
                instance_hostname: Set(Some(hostname.to_string())),
                updated_at: Set(Utc::now()),
            };
            settings.insert(&self.db).await?;
        }
        Ok(())
    }
}
