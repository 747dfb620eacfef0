//! Catalog models

pub mod country;
pub mod genre;
pub mod language;
pub mod movie;

pub use country::{Country, NewCountry};
pub use genre::{Genre, NewGenre};
pub use language::{Language, NewLanguage};
pub use movie::{Movie, MovieInput};
