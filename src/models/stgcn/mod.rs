pub mod block;
pub mod conditioner;
pub mod graph_conv;
pub mod model;
