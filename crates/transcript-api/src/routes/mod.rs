mod fetches;

pub use fetches::router;
