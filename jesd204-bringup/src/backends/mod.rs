pub mod clock_distributor;
pub mod link_layer;
pub mod sim;
pub mod transceiver;
