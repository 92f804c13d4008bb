pub mod annotate;
pub mod audit;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod export;
pub mod feed;
pub mod friends;
pub mod history;
pub mod lines;
pub mod local_commands;
pub mod message;
pub mod paths;
pub mod render;
pub mod scheduler;
pub mod store;
pub mod sync;
pub mod transcript;
pub mod util;
pub mod warn;
pub mod watcher;
