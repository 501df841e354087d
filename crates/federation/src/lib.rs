//! ActivityPub federation engine for akari.
//!
//! This crate implements the `ActivityPub` protocol surface of the server:
//!
//! - **Signature primitives**: HTTP Signatures (draft-cavage) signing and
//!   verification, digest and date-freshness checks
//! - **Validator**: structural and semantic validation of incoming
//!   activities
//! - **Dispatcher**: the inbox state machine that verifies, validates,
//!   dedups, and routes to a per-verb handler
//! - **Handlers**: Follow, Accept, Reject, Create, Update, Delete, Like,
//!   Announce, Undo, Move
//! - **Resolver**: remote actor resolution with store-backed caching
//! - **Delivery**: signed outbound delivery with shared-inbox fan-out and
//!   per-destination failure accounting
//!
//! # ActivityPub Compliance
//!
//! This implementation follows the W3C ActivityPub specification with
//! Misskey-specific extensions prefixed with `_misskey_`.

pub mod activity;
pub mod client;
pub mod delivery;
pub mod dispatcher;
pub mod handler;
pub mod handlers;
pub mod ledger;
pub mod resolver;
pub mod signature;
pub mod validator;

pub use activity::{Activity, EmojiIcon, EmojiTag, ObjectRef};
pub use client::{ApClient, ApClientError};
pub use delivery::{DeliveryError, DeliveryReport, DeliveryService, Deliverer, HttpDeliverer};
pub use dispatcher::{Dispatcher, InboxOutcome, InboxRequest};
pub use handler::inbox::{InboxState, inbox_handler, user_inbox_handler};
pub use handlers::{ActivityHandler, HandlerContext, HandlerResult};
pub use ledger::IdempotencyLedger;
pub use resolver::{ActorResolver, RemoteActorResolver};
pub use signature::{HttpSigner, SignatureComponents, SignatureError};
