//! Transactional email delivery for outreach workflows.
//!
//! A [`Mail`] is a single sender, single recipient message with either a
//! plain-text or an HTML body. [`MailTransport`] is the seam tools and
//! commands send through; [`SendGridClient`] is the production transport.
//!
//! Delivery status is reported, not enforced: anything other than `202
//! Accepted` is logged as a warning by [`dispatch`] and handed back to the
//! caller as a normal [`SendResponse`].

pub mod message;
pub mod sendgrid;
pub mod transport;

pub use message::{Content, ContentType, Mail};
pub use sendgrid::SendGridClient;
pub use transport::{dispatch, MailError, MailTransport, SendResponse, ACCEPTED};
