mod cache;
mod error;
mod events;
mod pager;
mod profiles;
mod reader;
mod realtime;
mod worker;

pub use cache::{CacheTag, QueryCache};
pub use error::WorkerError;
pub use events::WorkerEvent;
pub use pager::PAGE_SIZE;
pub use realtime::ConversationWatch;
pub use worker::RikoWorker;

pub use riko_core::{
    ConversationKind, ConversationView, MessagePage, MessageView, ParticipantRole,
    ParticipantView, ProfileData, RealtimeEvent,
};
pub use riko_db::{Conversation, Message, Participant, Profile, RikoDb};
