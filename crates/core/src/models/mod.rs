pub mod analytics;
pub mod category;
pub mod settings;
pub mod transaction;
pub mod window;
