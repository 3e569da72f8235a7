pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod listing;
pub mod mirror;
pub mod output;
pub mod reconcile;
pub mod store;
