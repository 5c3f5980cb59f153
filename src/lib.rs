//! Message translation service: immediate translation on arrival, then a
//! background fan-out into every supported language.

pub mod config;
pub mod db;
pub mod detect;
pub mod fanout;
pub mod i18n;
pub mod models;
pub mod server;
pub mod translation;
