pub mod consolidate;
pub mod decay;
pub mod expand;
pub mod relevance;
pub mod similarity;
pub mod threads;
pub mod types;
