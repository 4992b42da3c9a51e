mod url;

pub use url::*;
