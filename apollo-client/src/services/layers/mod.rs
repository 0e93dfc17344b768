//! Layers of the request pipeline.
pub(crate) mod apq;
pub(crate) mod cache_read;
pub(crate) mod cache_write;
pub(crate) mod response_code;
pub(crate) mod retry;
