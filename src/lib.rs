pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod scanner;
pub mod tagger;
