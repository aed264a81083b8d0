pub mod block_mapper;
pub mod block_reclaimer;
pub mod block_resolver;
pub mod file_reader;
pub mod file_writer;
