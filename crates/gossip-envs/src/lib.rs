//! Built-in environments for gossip-rl.
//!
//! - `WeddingGossip` - guests spread a rumour across reception tables

mod wedding_gossip;

pub use wedding_gossip::{WeddingGossip, WeddingGossipConfig, NAME};
