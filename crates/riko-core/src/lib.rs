mod events;
mod views;

pub use events::*;
pub use views::*;
