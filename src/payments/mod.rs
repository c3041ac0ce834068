//! Card-payment gateway integration module
//!
//! Server-to-server protocol 2.23: outbound registration and follow-up
//! requests, their plain-text responses, and the signed notifications the
//! gateway posts back.

pub mod codec;
pub mod manager;
pub mod notification;
pub mod request;
pub mod response;
pub mod signature;
pub mod tables;
pub mod traits;
pub mod transport;
pub mod types;
pub mod validation;

pub use manager::{GatewayManager, GatewaySettings};
pub use traits::{BaseUrlResolver, HttpTransport, RouteResolver};
pub use transport::{ReqwestTransport, TransportConfig};
pub use types::{Address, BasketItem, Mode, Status, Transaction, TransactionReference, TxType};
