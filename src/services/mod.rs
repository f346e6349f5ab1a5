pub mod advisories;
pub mod analytics;
pub mod assistant;
pub mod checkout;
pub mod pdf;
pub mod preferences;
pub mod report;
