/*!
Layered ("onion") message routing.

A sender picks an ordered circuit of relays and wraps a plaintext message
in one encryption layer per hop. Each relay unwraps exactly its own layer,
learns nothing but the address of its successor, and forwards an opaque
payload onward; the exit hop recovers the plaintext. The flow is strictly
one-way: there is no reply channel, no delivery confirmation and no retry,
so a message that fails anywhere on the path is silently lost by design.
*/

#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

pub mod circuit;
pub mod directory;
pub mod relay;
