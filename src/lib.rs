//! Notifications, mentions and comment threads for tournament and league pages.

pub mod api_doc;
pub mod auth;
pub mod comment;
pub mod config;
pub mod controller;
pub mod db;
pub mod event;
pub mod feed;
pub mod member;
pub mod mention;
pub mod notification;
pub mod routes;
pub mod store;
pub mod websocket;
