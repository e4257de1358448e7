mod health;
mod url;

pub use health::health_handler;
pub use url::{
    analytics_handler, create_url_handler, delete_url_handler, info_handler, redirect_handler,
};
