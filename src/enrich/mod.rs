pub mod europe_pmc;
pub mod scraper;

pub use scraper::is_probable_publication_url;
