pub mod assembler;
pub mod batcher;

pub use assembler::BatchAssembler;
pub use batcher::DocumentBatcher;
