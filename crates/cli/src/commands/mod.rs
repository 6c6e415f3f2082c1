pub mod export;
pub mod index;
pub mod search;
pub mod utils;

pub use export::handle_export;
pub use index::handle_index;
pub use search::handle_search;
