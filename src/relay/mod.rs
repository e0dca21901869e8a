/// Inbound event model
pub mod event;
/// Per-event relay handler
pub mod handler;
/// Per-photo relay serialization
pub mod locks;
/// Operator notifications
pub mod reporter;
/// Local staging directory
pub mod stage;
/// Download and upload steps
pub mod transfer;
/// Remote transport boundary
pub mod transport;
/// Event filtering
pub mod validator;

pub use event::{ChatId, InboundEvent, MediaPayload, MessageId, MessageRef, Peer, PhotoRef, Sender};
pub use handler::{RelayHandler, RelayState};
pub use locks::{MediaGuard, MediaLocks};
pub use reporter::ErrorReporter;
pub use stage::LocalStage;
pub use transfer::MediaTransfer;
pub use transport::{RelayTransport, TelegramTransport};
pub use validator::EventValidator;
