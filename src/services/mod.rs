pub mod attachment;
pub mod credentials;
pub mod moderation;
pub mod report;
