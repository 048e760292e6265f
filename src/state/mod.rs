pub mod model;
pub mod persistence;
pub mod store;

pub use model::{
    knowledge_key, parse_knowledge_key, HistoryEntry, KnowledgeEntry, Reminder, Role, State,
};
pub use persistence::StatePersistence;
pub use store::StateStore;
