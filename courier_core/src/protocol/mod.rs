/*!
 * Protocol layer — data types, constants, and credential handling.
 *
 * Everything related to *what* goes on the wire:
 * - `types` — EncodedPayload, Identity
 * - `constants` — header names, configuration keys, defaults
 * - `credential` — basic auth header value
 */

pub mod constants;
pub mod credential;
pub mod types;
