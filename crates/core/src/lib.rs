pub mod event;
pub mod guard;
pub mod models;
pub mod narration;
pub mod sse;
pub mod thinking;
