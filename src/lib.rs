pub mod cache;
pub mod catalogue;
pub mod config;
pub mod dashboard;
pub mod defaults;
pub mod domain;
pub mod error;
pub mod labels;
pub mod output;
pub mod remote;
pub mod selection;
pub mod series;
