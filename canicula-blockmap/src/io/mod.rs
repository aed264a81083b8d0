pub mod block_reader;
pub mod block_writer;
