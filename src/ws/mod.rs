pub mod codec;
pub mod relay;

#[cfg(test)]
pub mod test_relay;

pub use relay::{connect, RelayLink};
