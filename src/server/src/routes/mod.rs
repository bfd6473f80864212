//! 路由模块

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod history;
pub mod pools;
pub mod transparency;
pub mod wallet;
