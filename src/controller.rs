pub mod controller_handler;
pub mod supervisor;

pub use controller_handler::Controller;
pub use supervisor::Supervisor;
