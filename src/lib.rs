pub mod cost;
pub mod erase;
pub mod errors;
pub mod evaluate;
pub mod event;
pub mod event_tree;
pub mod grid;
pub mod nhx;
pub mod ordered;
pub mod sim;
pub mod synteny;
pub mod unordered;
pub mod viz;
