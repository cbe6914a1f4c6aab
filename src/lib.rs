pub mod api;
pub mod app;
pub mod config;
pub mod consent;
pub mod controller;
pub mod events;
pub mod geocode;
pub mod ip;
pub mod location;
pub mod logging;
pub mod models;
pub mod precise;
pub mod resolver;
pub mod ui;
