//! PostgreSQL repositories for the catalog entities

pub mod country;
pub mod genre;
pub mod language;
pub mod movie;

pub use country::CountryRepository;
pub use genre::GenreRepository;
pub use language::LanguageRepository;
pub use movie::MovieRepository;
