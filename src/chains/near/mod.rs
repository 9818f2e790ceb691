pub mod client;
pub mod context;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod rescanner;
pub mod scanner;
