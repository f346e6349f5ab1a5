pub mod expense;
pub mod preferences;
pub mod user;

pub use expense::{Category, Expense, NewExpense};
pub use preferences::{NotificationKey, NotificationPreferences, SecurityKey, SecurityPreferences};
pub use user::{CurrentUser, User};
