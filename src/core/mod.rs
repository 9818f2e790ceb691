pub mod observer;
pub mod scanner;
pub mod table;
