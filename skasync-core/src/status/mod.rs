//! Components H and I: the deploy-status probe and the gate that holds sync
//! traffic until a deploy is ready.

pub mod gate;
pub mod probe;
