mod claude;

pub use claude::{Claude, ExtractOptions};
