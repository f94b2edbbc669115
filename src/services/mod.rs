pub mod cursor_batch;
