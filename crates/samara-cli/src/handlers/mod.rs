pub mod audit;
pub mod digest;
pub mod senses;
pub mod stream;
pub mod threads;
pub mod triggers;
pub mod wake;
