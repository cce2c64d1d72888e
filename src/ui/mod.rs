//! Terminal UI: a live training dashboard with reward and loss charts, stats,
//! and a live view of the cart-pole.

pub mod cartpole_widget;
pub mod training_dashboard;
pub mod training_view;
