/// Append-only analytics log of participant moves.
pub mod move_log;
/// Database model definitions.
pub mod models;
/// Durable engine snapshot stored on disk.
pub mod save_state;
/// Storage abstraction layer for database operations.
pub mod storage;
