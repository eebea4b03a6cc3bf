//! 브로커에서 핸들러로 전달되는 메시지 형태
mod delivery;
mod envelope;
mod parse;

pub use delivery::{MessageAttributes, QueueDelivery};
pub use envelope::{BrokerEnvelope, EnvelopeAttribute};
pub use parse::ParseResult;
