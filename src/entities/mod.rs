//! Record schemas for every table the admin panel manages.

mod admin;
mod catalog;
mod portfolio;

pub use admin::{ActivityLog, AdminUser, SettingValue, SystemSetting, WhatsAppContact};
pub use catalog::{Faq, Product, Service, SpecialService};
pub use portfolio::{Project, WebApplication, WebsiteProject};
