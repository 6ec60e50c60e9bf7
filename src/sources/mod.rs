pub mod mangadex;

pub use mangadex::MangaDexSource;
