//! External service clients

pub mod content_generator;

pub use content_generator::{ContentGenerator, HttpContentGenerator};
