mod history;
mod repository;
mod schema;

pub use history::HistoryStore;
pub use repository::Repository;
