mod index;
mod query;

pub use index::{FileLog, handle_index, index_tree};
pub use query::{handle_query, run_query};
