//! Checkout core: the finalization state machine, the payment-provider
//! gateway boundary, and webhook signature verification.

mod finalize;
pub mod gateway;
pub mod webhook;

pub use finalize::{FailureReason, Finalization, FinalizeError, Finalizer, MAX_TICKET_MINTS};
pub use gateway::{GatewayError, PaymentGateway, RestGateway};
