/*!
 * Configuration layer — the layered key/value store and snapshot resolution.
 *
 * - `store` — `Config`, a flat dot-keyed map with typed accessors
 * - `resolve` — `SenderConfig` snapshots and the renewal predicate
 */

pub mod resolve;
pub mod store;

pub use resolve::{SenderConfig, SenderKeys};
pub use store::{join, Config};
