pub mod expenses;
pub mod preferences;
pub mod users;
