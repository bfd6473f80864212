//! 核心业务逻辑模块

pub mod otp;
pub mod pools;
pub mod sessions;
pub mod users;
pub mod wallet;
