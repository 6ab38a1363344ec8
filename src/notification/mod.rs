pub mod aggregate;
pub mod controller;
pub mod factory;
pub mod model;
pub mod retention;
pub mod service;
