pub mod health;
pub mod recommendations;

pub use health::health_check;
pub use recommendations::{get_recommendations, recommendations_config};
