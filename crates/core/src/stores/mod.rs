pub mod memory;
pub mod postgres;
pub mod qdrant;

pub use memory::{InMemoryIndex, InMemoryRepository};
pub use postgres::PgCandidateRepository;
pub use qdrant::QdrantIndex;
