pub mod config;
pub mod coop;
pub mod download;
pub mod fifo_source;
pub mod keywords;
pub mod shell;
pub mod tabbed;
pub mod uri;
pub mod util;
