//! Database entities

pub mod custom_domain;
pub mod site_settings;

pub use custom_domain::Entity as CustomDomain;
pub use site_settings::Entity as SiteSettings;

pub mod prelude {
    pub use super::custom_domain::Entity as CustomDomain;
    pub use super::site_settings::Entity as SiteSettings;
}
