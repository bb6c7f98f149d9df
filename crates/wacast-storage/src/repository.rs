//! Repository layer for data access

pub mod campaigns;
pub mod jobs;
pub mod recipients;
pub mod send_logs;
pub mod senders;

pub use campaigns::CampaignRepository;
pub use jobs::JobRepository;
pub use recipients::RecipientRepository;
pub use send_logs::SendLogRepository;
pub use senders::SenderRepository;
