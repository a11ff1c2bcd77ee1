mod generate;
mod health;
mod runs;
mod workspace;
pub mod ws;

pub use generate::{generate, get_models};
pub use health::health_check;
pub use runs::{execute, get_latest, run_cases};
pub use workspace::{get_workspace, put_workspace};
pub use ws::{ws_handler, WsBroker};
