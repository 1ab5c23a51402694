pub mod loader;
pub mod resolve;
pub mod schema;

pub use loader::DataLoadError;
pub use resolve::{GameData, load_game_data};
