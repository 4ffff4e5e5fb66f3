pub mod common;
pub mod completions;
pub mod config;
pub mod deck;
pub mod due;
pub mod export;
pub mod init;
pub mod item;
pub mod review;
pub mod series;
pub mod simulate;
pub mod sync;
