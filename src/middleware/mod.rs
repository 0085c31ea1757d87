//! Ready-made middlewares for [`Store::use_middleware`](crate::Store::use_middleware).

mod logger;

pub use logger::logger;
