pub mod board_ctx;
pub mod board_flow;

pub use board_ctx::BoardCtx;
pub use board_flow::{BoardExtraction, BoardFlow};
