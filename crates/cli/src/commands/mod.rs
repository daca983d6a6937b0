pub mod ask;
pub mod chat;
pub mod doctor;
pub mod gateway;
pub mod history;
pub mod knowledge;
pub mod onboard;
pub mod runtime;
