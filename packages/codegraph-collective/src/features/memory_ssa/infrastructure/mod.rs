pub mod builder;

pub use builder::MemorySsaBuilder;
