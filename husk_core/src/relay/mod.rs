/*! One relay's receive, decrypt, forward/deliver cycle.
*/

pub mod codec;
pub mod errors;
pub mod processor;
pub mod server;
