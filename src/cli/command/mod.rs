pub mod download;
pub mod list;

pub use download::download;
pub use list::list;
