// src/config/mod.rs
pub mod generative;

pub use generative::GenerativeConfig;
