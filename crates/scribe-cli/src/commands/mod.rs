pub mod conversations;
pub mod logging;
